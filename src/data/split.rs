// ============================================================
// Layer 4 - Split Slicing
// ============================================================
// Parses dataset split expressions such as:
//
//   "train"           → every row of the train split
//   "train[:1%]"      → the first 1% of the train split
//   "train[10:200]"   → rows 10..200
//   "validation[50%:]"→ the second half of validation
//
// Percent bounds are resolved against the split's total row
// count and rounded to the closest row. All bounds clamp to
// the row count; an inverted slice is empty.

use std::ops::Range;

use anyhow::{bail, Context, Result};

/// One end of a slice: an absolute row index or a percentage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bound {
    Rows(usize),
    Percent(f64),
}

impl Bound {
    fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Some(pct) = s.strip_suffix('%') {
            let value: f64 = pct
                .trim()
                .parse()
                .with_context(|| format!("Invalid percent bound '{s}'"))?;
            if !(0.0..=100.0).contains(&value) {
                bail!("Percent bound '{s}' must be between 0% and 100%");
            }
            Ok(Bound::Percent(value))
        } else {
            let rows: usize = s
                .parse()
                .with_context(|| format!("Invalid row bound '{s}'"))?;
            Ok(Bound::Rows(rows))
        }
    }

    fn resolve(self, total: usize) -> usize {
        let row = match self {
            Bound::Rows(n) => n,
            Bound::Percent(p) => ((total as f64) * p / 100.0).round() as usize,
        };
        row.min(total)
    }
}

/// A split name plus an optional `[start:end]` slice.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitSelection {
    pub name:  String,
    pub start: Option<Bound>,
    pub end:   Option<Bound>,
}

impl SplitSelection {
    pub fn parse(expr: &str) -> Result<Self> {
        let expr = expr.trim();
        let Some(open) = expr.find('[') else {
            if expr.is_empty() {
                bail!("Split name must not be empty");
            }
            return Ok(Self { name: expr.to_string(), start: None, end: None });
        };

        let name = expr[..open].trim();
        if name.is_empty() {
            bail!("Split '{expr}' has no name before '['");
        }
        let inner = expr[open + 1..]
            .strip_suffix(']')
            .with_context(|| format!("Split '{expr}' is missing a closing ']'"))?;
        let (lo, hi) = inner
            .split_once(':')
            .with_context(|| format!("Split '{expr}' slice must contain ':'"))?;

        let start = if lo.trim().is_empty() { None } else { Some(Bound::parse(lo)?) };
        let end   = if hi.trim().is_empty() { None } else { Some(Bound::parse(hi)?) };

        Ok(Self { name: name.to_string(), start, end })
    }

    /// Row range selected by this selection in a split of `total` rows.
    pub fn resolve(&self, total: usize) -> Range<usize> {
        let start = self.start.map_or(0, |b| b.resolve(total));
        let end   = self.end.map_or(total, |b| b.resolve(total));
        start..end.max(start)
    }

    /// A filesystem-safe name for caching this exact selection.
    pub fn cache_key(&self) -> String {
        let bound = |b: Option<Bound>| match b {
            None => String::new(),
            Some(Bound::Rows(n)) => n.to_string(),
            Some(Bound::Percent(p)) => format!("{p}pct"),
        };
        match (self.start, self.end) {
            (None, None) => self.name.clone(),
            _ => format!("{}_{}-{}", self.name, bound(self.start), bound(self.end)),
        }
    }
}
