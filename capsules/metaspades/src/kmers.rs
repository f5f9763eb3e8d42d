use invocation::WrapperError;
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_KMERS: &str = "21,33,55,77,99,127";
const MAX_KMER: u32 = 150;

/// Comma-separated odd k-mer sizes passed to `spades.py -k`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KmerList(Vec<u32>);

impl KmerList {
    pub fn sizes(&self) -> &[u32] {
        &self.0
    }
}

impl FromStr for KmerList {
    type Err = WrapperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut sizes = Vec::new();
        for raw in s.split(',') {
            let value = raw.trim();
            let invalid = |reason: &str| WrapperError::InvalidKmer {
                value: value.to_string(),
                reason: reason.to_string(),
            };
            let k: u32 = value.parse().map_err(|_| invalid("not an integer"))?;
            if k == 0 || k > MAX_KMER {
                return Err(invalid("out of the allowed range 1..=150"));
            }
            if k % 2 == 0 {
                return Err(invalid("must be an odd number"));
            }
            sizes.push(k);
        }
        Ok(KmerList(sizes))
    }
}

impl fmt::Display for KmerList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .0
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(",");
        f.write_str(&joined)
    }
}
