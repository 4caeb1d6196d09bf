use std::fmt;

use crate::chain::{self, Arena};
use crate::table::HashTable;

/// Number of chain length buckets, longer chains are counted in the last one
pub const STATS_VECTLEN: usize = 50;

/// Chain statistics of one table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableStats {
    pub size: usize,
    pub used: usize,
    /// Non-empty buckets
    pub slots: usize,
    pub max_chain_len: usize,
    pub total_chain_len: usize,
    /// `histogram[n]` buckets have a chain of length `n`,
    /// the last element also counts every longer chain
    pub histogram: [usize; STATS_VECTLEN],
}

impl TableStats {
    pub(crate) fn collect<K, V>(ht: &HashTable, arena: &Arena<K, V>) -> Self {
        let mut stats = TableStats {
            size: ht.size(),
            used: ht.used,
            slots: 0,
            max_chain_len: 0,
            total_chain_len: 0,
            histogram: [0; STATS_VECTLEN],
        };

        for head in &ht.buckets {
            let len = chain::iter(arena, *head).count();
            stats.histogram[len.min(STATS_VECTLEN - 1)] += 1;
            if len == 0 {
                continue;
            }
            stats.slots += 1;
            stats.max_chain_len = stats.max_chain_len.max(len);
            stats.total_chain_len += len;
        }
        stats
    }

    pub fn avg_chain_len(&self) -> f64 {
        if self.slots == 0 {
            return 0.0;
        }
        self.total_chain_len as f64 / self.slots as f64
    }
}

impl fmt::Display for TableStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.used == 0 {
            return writeln!(f, "No stats available for empty dictionaries");
        }

        writeln!(f, "Hash table stats:")?;
        writeln!(f, " table size: {}", self.size)?;
        writeln!(f, " number of elements: {}", self.used)?;
        writeln!(f, " different slots: {}", self.slots)?;
        writeln!(f, " max chain length: {}", self.max_chain_len)?;
        writeln!(f, " avg chain length (counted): {:.2}", self.avg_chain_len())?;
        writeln!(
            f,
            " avg chain length (computed): {:.2}",
            self.used as f64 / self.slots as f64
        )?;
        writeln!(f, " Chain length distribution:")?;
        for (len, &count) in self.histogram.iter().enumerate() {
            if count == 0 {
                continue;
            }
            let prefix = if len == STATS_VECTLEN - 1 { ">= " } else { "" };
            let percent = count as f64 / self.size as f64 * 100.0;
            writeln!(f, "   {prefix}{len}: {count} ({percent:.2}%)")?;
        }
        Ok(())
    }
}

/// Statistics of both tables of a dictionary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DictStats {
    pub primary: TableStats,
    /// Only present while rehashing
    pub rehash_target: Option<TableStats>,
}

impl fmt::Display for DictStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.primary)?;
        if let Some(target) = &self.rehash_target {
            writeln!(f, "-- Rehashing into ht[1]:")?;
            write!(f, "{target}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::STATS_VECTLEN;
    use crate::{Dict, DictType, IntKeys};

    /// Every key lands in bucket 0
    struct Collide;

    impl DictType for Collide {
        type Key = u32;
        type Value = ();

        fn hash(&self, _key: &u32) -> u32 {
            0
        }
        fn key_eq(&self, a: &u32, b: &u32) -> bool {
            a == b
        }
    }

    #[test]
    fn empty() {
        let d = Dict::new(IntKeys::<()>::new());
        let stats = d.stats();
        assert_eq!(stats.primary.size, 0);
        assert_eq!(stats.rehash_target, None);
        assert_eq!(stats.to_string(), "No stats available for empty dictionaries\n");
    }

    #[test]
    fn counts_chains() {
        let mut d = Dict::with_capacity(IntKeys::<()>::new(), 64);
        for i in 0..40 {
            d.insert(i, ()).unwrap();
        }
        let stats = d.stats().primary;

        assert_eq!(stats.size, 64);
        assert_eq!(stats.used, 40);
        assert_eq!(stats.total_chain_len, 40);
        assert_eq!(stats.histogram.iter().sum::<usize>(), 64);
        assert_eq!(stats.histogram[0], 64 - stats.slots);
        assert!(stats.max_chain_len >= 1);
        assert!((stats.avg_chain_len() - 40.0 / stats.slots as f64).abs() < 1e-9);
    }

    #[test]
    fn long_chains_share_the_last_bucket() {
        let mut d = Dict::with_capacity(Collide, 128);
        d.disable_resize();
        for i in 0..60 {
            d.insert(i, ()).unwrap();
        }
        let stats = d.stats().primary;
        assert_eq!(stats.slots, 1);
        assert_eq!(stats.max_chain_len, 60);
        assert_eq!(stats.histogram[STATS_VECTLEN - 1], 1);
        assert_eq!(stats.histogram[0], 127);
        assert!(stats.to_string().contains("   >= 49: 1 (0.78%)\n"));
    }

    #[test]
    fn display_format() {
        let mut d = Dict::with_capacity(Collide, 4);
        d.insert(1, ()).unwrap();
        d.insert(2, ()).unwrap();

        let report = d.stats().to_string();
        let expected = "Hash table stats:\n \
                        table size: 4\n \
                        number of elements: 2\n \
                        different slots: 1\n \
                        max chain length: 2\n \
                        avg chain length (counted): 2.00\n \
                        avg chain length (computed): 2.00\n \
                        Chain length distribution:\n   \
                        0: 3 (75.00%)\n   \
                        2: 1 (25.00%)\n";
        assert_eq!(report, expected);
    }

    #[test]
    fn reports_rehash_target() {
        let mut d = Dict::new(IntKeys::<()>::new());
        for i in 0..5 {
            d.insert(i, ()).unwrap();
        }
        let stats = d.stats();
        let target = stats.rehash_target.as_ref().unwrap();
        assert_eq!(target.size, 8);
        assert_eq!(stats.primary.used + target.used, 5);
        assert!(stats.to_string().contains("-- Rehashing into ht[1]:\n"));
    }
}
