//! Search spaces: the candidate strings allowed at each position of a pattern.

use std::str::FromStr;

use itertools::Itertools;

use crate::error::{MitmError, MitmResult};

/// The candidate strings usable at one position of a search space.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SegmentSet {
    candidates: Vec<Vec<u8>>,
}

impl SegmentSet {
    /// Creates a segment set from its candidates, in order.
    pub fn new<I, S>(candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<[u8]>,
    {
        candidates.into_iter().collect()
    }

    /// Returns the number of candidates.
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    /// Returns true if there is no candidate.
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Returns the candidate at the given index.
    pub fn get(&self, i: usize) -> Option<&[u8]> {
        self.candidates.get(i).map(Vec::as_slice)
    }

    /// Returns an iterator over the candidates.
    pub fn iter(&self) -> impl Iterator<Item = &[u8]> + '_ {
        self.candidates.iter().map(Vec::as_slice)
    }

    /// Returns the length of the longest candidate.
    pub fn max_len(&self) -> usize {
        self.candidates.iter().map(Vec::len).max().unwrap_or(0)
    }
}

impl std::ops::Index<usize> for SegmentSet {
    type Output = [u8];

    fn index(&self, i: usize) -> &[u8] {
        &self.candidates[i]
    }
}

impl<S: AsRef<[u8]>> FromIterator<S> for SegmentSet {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self {
            candidates: iter.into_iter().map(|s| s.as_ref().to_vec()).collect(),
        }
    }
}

/// An ordered sequence of segment sets, describing one half of a pattern such as
/// `(foo|bar|baz)(spam|ham|eggs)`.
///
/// A search space can be parsed from a pattern made of:
/// - alternation groups `(a|b|c)`, where empty alternatives are allowed,
/// - character classes `[0-9a-f_]`,
/// - literal runs, each becoming a segment with a single candidate.
///
/// `\` escapes the next character.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SearchSpace {
    segments: Vec<SegmentSet>,
}

impl SearchSpace {
    /// Creates a search space from its segment sets, in order.
    pub fn new(segments: Vec<SegmentSet>) -> Self {
        Self { segments }
    }

    /// Appends a segment set.
    pub fn push(&mut self, segment: SegmentSet) {
        self.segments.push(segment);
    }

    /// Returns the segment sets.
    pub fn segments(&self) -> &[SegmentSet] {
        &self.segments
    }

    /// Returns the number of segment sets.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Returns true if there is no segment set.
    /// An empty search space still holds one combination: the empty string.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Returns the number of combinations, or `None` if it overflows.
    pub fn cardinality(&self) -> Option<u128> {
        self.segments
            .iter()
            .try_fold(1u128, |acc, segment| acc.checked_mul(segment.len() as u128))
    }

    /// Fails on the first segment set without candidates.
    pub fn validate(&self) -> MitmResult<()> {
        match self.segments.iter().position(SegmentSet::is_empty) {
            Some(index) => Err(MitmError::EmptySegmentSet { index }),
            None => Ok(()),
        }
    }

    /// Returns a lazy iterator over the index tuples of all combinations.
    pub fn combinations(&self) -> Combinations {
        Combinations::new(self.segments.iter().map(SegmentSet::len).collect())
    }

    /// Returns a lazy iterator over all the strings of this search space.
    pub fn texts(&self) -> impl Iterator<Item = Vec<u8>> + '_ {
        self.combinations().map(|indices| {
            indices
                .iter()
                .zip(&self.segments)
                .flat_map(|(&i, segment)| segment[i].iter().copied())
                .collect()
        })
    }
}

impl FromIterator<SegmentSet> for SearchSpace {
    fn from_iter<T: IntoIterator<Item = SegmentSet>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl FromStr for SearchSpace {
    type Err = MitmError;

    fn from_str(pattern: &str) -> MitmResult<Self> {
        PatternParser::new(pattern.as_bytes()).parse()
    }
}

struct PatternParser<'a> {
    pattern: &'a [u8],
    pos: usize,
    segments: Vec<SegmentSet>,
    literal: Vec<u8>,
}

impl<'a> PatternParser<'a> {
    fn new(pattern: &'a [u8]) -> Self {
        Self {
            pattern,
            pos: 0,
            segments: Vec::new(),
            literal: Vec::new(),
        }
    }

    fn error(&self, position: usize, reason: &str) -> MitmError {
        MitmError::Pattern {
            position,
            reason: reason.to_owned(),
        }
    }

    fn parse(mut self) -> MitmResult<SearchSpace> {
        while let Some(&c) = self.pattern.get(self.pos) {
            match c {
                b'(' => {
                    self.flush_literal();
                    let group = self.parse_group()?;
                    self.segments.push(group);
                }
                b'[' => {
                    self.flush_literal();
                    let class = self.parse_class()?;
                    self.segments.push(class);
                }
                b')' | b']' | b'|' => {
                    return Err(self.error(self.pos, "unexpected character outside of a group"))
                }
                _ => {
                    let c = self.next_char()?;
                    self.literal.push(c);
                }
            }
        }

        self.flush_literal();
        Ok(SearchSpace::new(self.segments))
    }

    fn flush_literal(&mut self) {
        if !self.literal.is_empty() {
            let literal = std::mem::take(&mut self.literal);
            self.segments.push(SegmentSet::new([literal]));
        }
    }

    /// Consumes one character, resolving escapes.
    fn next_char(&mut self) -> MitmResult<u8> {
        match self.pattern.get(self.pos) {
            Some(b'\\') => match self.pattern.get(self.pos + 1) {
                Some(&c) => {
                    self.pos += 2;
                    Ok(c)
                }
                None => Err(self.error(self.pos, "dangling escape")),
            },
            Some(&c) => {
                self.pos += 1;
                Ok(c)
            }
            None => Err(self.error(self.pos, "unexpected end of pattern")),
        }
    }

    fn parse_group(&mut self) -> MitmResult<SegmentSet> {
        let start = self.pos;
        self.pos += 1;

        let mut alternatives = Vec::new();
        let mut current = Vec::new();

        loop {
            match self.pattern.get(self.pos) {
                None => return Err(self.error(start, "unterminated group")),
                Some(b')') => {
                    self.pos += 1;
                    alternatives.push(current);
                    return Ok(SegmentSet::new(alternatives));
                }
                Some(b'|') => {
                    self.pos += 1;
                    alternatives.push(std::mem::take(&mut current));
                }
                Some(b'(') | Some(b'[') => {
                    return Err(self.error(self.pos, "nested groups are not supported"))
                }
                Some(_) => {
                    let c = self.next_char()?;
                    current.push(c);
                }
            }
        }
    }

    fn parse_class(&mut self) -> MitmResult<SegmentSet> {
        let start = self.pos;
        self.pos += 1;

        let mut chars = Vec::new();

        loop {
            match self.pattern.get(self.pos) {
                None => return Err(self.error(start, "unterminated character class")),
                Some(b']') => {
                    self.pos += 1;
                    break;
                }
                Some(_) => {
                    let range_start = self.pos;
                    let first = self.next_char()?;

                    // a `-` right before `]` is a plain character
                    let is_range = self.pattern.get(self.pos) == Some(&b'-')
                        && !matches!(self.pattern.get(self.pos + 1), Some(b']') | None);

                    if is_range {
                        self.pos += 1;
                        let last = self.next_char()?;
                        if last < first {
                            return Err(self.error(range_start, "reversed character range"));
                        }
                        chars.extend(first..=last);
                    } else {
                        chars.push(first);
                    }
                }
            }
        }

        if chars.is_empty() {
            return Err(self.error(start, "empty character class"));
        }

        Ok(chars.into_iter().unique().map(|c| [c]).collect())
    }
}

/// A lazy iterator over the index tuples of a cartesian product, like an odometer:
/// the last position moves the fastest.
#[derive(Clone, Debug)]
pub struct Combinations {
    radices: Vec<usize>,
    current: Vec<usize>,
    remaining: u128,
    started: bool,
}

impl Combinations {
    /// Creates an iterator over all tuples `t` such that `t[i] < radices[i]`.
    pub fn new(radices: Vec<usize>) -> Self {
        let remaining = radices
            .iter()
            .try_fold(1u128, |acc, &radix| acc.checked_mul(radix as u128))
            .unwrap_or(u128::MAX);

        Self {
            current: vec![0; radices.len()],
            radices,
            remaining,
            started: false,
        }
    }

    /// Moves to the next combination.
    /// Returns the leftmost position that changed, or `None` once every combination was seen.
    /// All positions are reported as changed for the first combination.
    pub fn advance(&mut self) -> Option<usize> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        if !self.started {
            self.started = true;
            return Some(0);
        }

        for pos in (0..self.radices.len()).rev() {
            self.current[pos] += 1;
            if self.current[pos] < self.radices[pos] {
                return Some(pos);
            }
            self.current[pos] = 0;
        }

        // only reachable if `remaining` was saturated
        self.remaining = 0;
        None
    }

    /// Returns the current combination.
    pub fn current(&self) -> &[usize] {
        &self.current
    }
}

impl Iterator for Combinations {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        self.advance().map(|_| self.current.clone())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match usize::try_from(self.remaining) {
            Ok(remaining) => (remaining, Some(remaining)),
            Err(_) => (usize::MAX, None),
        }
    }
}
