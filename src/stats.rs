//! Chain-length statistics for diagnosing hash quality.

use crate::table::{Entries, Table};
use core::fmt;

/// Histogram slots; the last one counts every chain of this length minus
/// one or longer.
pub const STATS_VECTLEN: usize = 50;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableStats {
    pub capacity: usize,
    pub len: usize,
    /// Non-empty buckets.
    pub used_buckets: usize,
    pub max_chain_len: usize,
    pub total_chain_len: usize,
    /// `chain_len_histogram[n]` buckets hold chains of length `n`; slot 0
    /// counts empty buckets.
    pub chain_len_histogram: [usize; STATS_VECTLEN],
}

impl TableStats {
    fn collect<K, V>(table: &Table, entries: &Entries<K, V>) -> Self {
        let mut s = TableStats {
            capacity: table.capacity(),
            len: table.len,
            used_buckets: 0,
            max_chain_len: 0,
            total_chain_len: 0,
            chain_len_histogram: [0; STATS_VECTLEN],
        };
        for bucket in 0..table.capacity() {
            let n = table.chain_len(entries, bucket);
            s.chain_len_histogram[n.min(STATS_VECTLEN - 1)] += 1;
            if n == 0 {
                continue;
            }
            s.used_buckets += 1;
            s.max_chain_len = s.max_chain_len.max(n);
            s.total_chain_len += n;
        }
        s
    }

    /// Mean length of non-empty chains, from walking them.
    pub fn avg_chain_len(&self) -> f64 {
        if self.used_buckets == 0 {
            return 0.0;
        }
        self.total_chain_len as f64 / self.used_buckets as f64
    }

    /// Mean length of non-empty chains, from the entry count.
    pub fn avg_chain_len_computed(&self) -> f64 {
        if self.used_buckets == 0 {
            return 0.0;
        }
        self.len as f64 / self.used_buckets as f64
    }
}

impl fmt::Display for TableStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.len == 0 {
            return writeln!(f, "No stats available for empty dictionaries");
        }
        writeln!(f, "Hash table stats:")?;
        writeln!(f, " table size: {}", self.capacity)?;
        writeln!(f, " number of elements: {}", self.len)?;
        writeln!(f, " different slots: {}", self.used_buckets)?;
        writeln!(f, " max chain length: {}", self.max_chain_len)?;
        writeln!(f, " avg chain length (counted): {:.2}", self.avg_chain_len())?;
        writeln!(f, " avg chain length (computed): {:.2}", self.avg_chain_len_computed())?;
        writeln!(f, " Chain length distribution:")?;
        for (n, &count) in self.chain_len_histogram.iter().enumerate() {
            if count == 0 {
                continue;
            }
            let prefix = if n == STATS_VECTLEN - 1 { ">= " } else { "" };
            let pct = count as f64 / self.capacity as f64 * 100.0;
            writeln!(f, "   {prefix}{n}: {count} ({pct:.2}%)")?;
        }
        Ok(())
    }
}

/// Snapshot of both tables, from [`Dict::stats`](crate::Dict::stats).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DictStats {
    pub active: TableStats,
    /// Present while a migration is in progress.
    pub incoming: Option<TableStats>,
}

impl DictStats {
    pub(crate) fn collect<K, V>(tables: &[Table; 2], entries: &Entries<K, V>, rehashing: bool) -> Self {
        DictStats {
            active: TableStats::collect(&tables[0], entries),
            incoming: rehashing.then(|| TableStats::collect(&tables[1], entries)),
        }
    }
}

impl fmt::Display for DictStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.active)?;
        if let Some(incoming) = &self.incoming {
            writeln!(f, "-- Rehashing into ht[1]:")?;
            write!(f, "{incoming}")?;
        }
        Ok(())
    }
}
