//! Stable hashing of stage inputs.
//!
//! Floats are hashed by bit pattern so `0.1` and `0.1` always collide and
//! `0.0` and `-0.0` never do.

use std::hash::{DefaultHasher, Hasher};

use geo::{Coord, LineString, Point, Polygon};

use crate::PolygonSet;

/// Accumulates input values into a 64-bit fingerprint.
#[derive(Debug, Default, Clone)]
pub struct Fingerprinter(DefaultHasher);

impl Fingerprinter {
    /// Start an empty fingerprint.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a float by its bit pattern.
    pub fn write_f64(&mut self, value: f64) {
        self.0.write_u64(value.to_bits());
    }

    /// Feed an unsigned integer.
    pub fn write_u64(&mut self, value: u64) {
        self.0.write_u64(value);
    }

    /// Feed a string, length-prefixed so adjacent strings cannot merge.
    pub fn write_str(&mut self, value: &str) {
        self.write_u64(value.len() as u64);
        self.0.write(value.as_bytes());
    }

    /// Finish and return the fingerprint.
    #[must_use]
    pub fn finish(&self) -> u64 {
        self.0.finish()
    }
}

/// A value that can contribute to a cache key.
pub trait Fingerprint {
    /// Feed this value into `state`.
    fn fingerprint(&self, state: &mut Fingerprinter);
}

impl<T: Fingerprint + ?Sized> Fingerprint for &T {
    fn fingerprint(&self, state: &mut Fingerprinter) {
        (**self).fingerprint(state);
    }
}

impl Fingerprint for f64 {
    fn fingerprint(&self, state: &mut Fingerprinter) {
        state.write_f64(*self);
    }
}

macro_rules! fingerprint_unsigned {
    ($($ty:ty),*) => {
        $(
            impl Fingerprint for $ty {
                fn fingerprint(&self, state: &mut Fingerprinter) {
                    state.write_u64(u64::from(*self));
                }
            }
        )*
    };
}

fingerprint_unsigned!(u8, u16, u32, u64, bool);

impl Fingerprint for usize {
    fn fingerprint(&self, state: &mut Fingerprinter) {
        state.write_u64(*self as u64);
    }
}

impl Fingerprint for str {
    fn fingerprint(&self, state: &mut Fingerprinter) {
        state.write_str(self);
    }
}

impl Fingerprint for String {
    fn fingerprint(&self, state: &mut Fingerprinter) {
        state.write_str(self);
    }
}

impl<T: Fingerprint> Fingerprint for Option<T> {
    fn fingerprint(&self, state: &mut Fingerprinter) {
        match self {
            Some(value) => {
                state.write_u64(1);
                value.fingerprint(state);
            }
            None => state.write_u64(0),
        }
    }
}

impl<T: Fingerprint> Fingerprint for [T] {
    fn fingerprint(&self, state: &mut Fingerprinter) {
        state.write_u64(self.len() as u64);
        for item in self {
            item.fingerprint(state);
        }
    }
}

impl<T: Fingerprint> Fingerprint for Vec<T> {
    fn fingerprint(&self, state: &mut Fingerprinter) {
        self.as_slice().fingerprint(state);
    }
}

macro_rules! fingerprint_tuple {
    ($($name:ident $index:tt),+) => {
        impl<$($name: Fingerprint),+> Fingerprint for ($($name,)+) {
            fn fingerprint(&self, state: &mut Fingerprinter) {
                $(self.$index.fingerprint(state);)+
            }
        }
    };
}

fingerprint_tuple!(A 0, B 1);
fingerprint_tuple!(A 0, B 1, C 2);
fingerprint_tuple!(A 0, B 1, C 2, D 3);

impl Fingerprint for Coord<f64> {
    fn fingerprint(&self, state: &mut Fingerprinter) {
        state.write_f64(self.x);
        state.write_f64(self.y);
    }
}

impl Fingerprint for Point<f64> {
    fn fingerprint(&self, state: &mut Fingerprinter) {
        self.0.fingerprint(state);
    }
}

impl Fingerprint for LineString<f64> {
    fn fingerprint(&self, state: &mut Fingerprinter) {
        self.0.fingerprint(state);
    }
}

impl Fingerprint for Polygon<f64> {
    fn fingerprint(&self, state: &mut Fingerprinter) {
        self.exterior().fingerprint(state);
        self.interiors().fingerprint(state);
    }
}

impl Fingerprint for PolygonSet {
    fn fingerprint(&self, state: &mut Fingerprinter) {
        self.polygons().fingerprint(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn digest(value: &impl Fingerprint) -> u64 {
        let mut state = Fingerprinter::new();
        value.fingerprint(&mut state);
        state.finish()
    }

    #[rstest]
    fn equal_inputs_share_a_fingerprint() {
        assert_eq!(digest(&(1.5_f64, "walking")), digest(&(1.5_f64, "walking")));
    }

    #[rstest]
    fn signed_zeroes_differ() {
        assert_ne!(digest(&0.0_f64), digest(&-0.0_f64));
    }

    #[rstest]
    fn adjacent_strings_do_not_merge() {
        assert_ne!(digest(&("ab", "c")), digest(&("a", "bc")));
    }
}
