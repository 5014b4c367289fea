//! Ordering and equality strategies.
//!
//! Tree buckets order their nodes with a [`Comparator`]; chain buckets match
//! values with an [`EqPredicate`]. The two are configured independently, but
//! the table is only correct when they agree: `compare(a, b) == Equal`
//! exactly when `eq(a, b)`. This is a documented precondition and is not
//! checked.

use core::cmp::Ordering;

/// Total order over `T`.
pub trait Comparator<T: ?Sized> {
    fn compare(&self, a: &T, b: &T) -> Ordering;
}

/// Equality predicate over `T`.
pub trait EqPredicate<T: ?Sized> {
    fn equals(&self, a: &T, b: &T) -> bool;
}

/// Orders values by their `Ord` implementation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NaturalOrder;

impl<T: ?Sized + Ord> Comparator<T> for NaturalOrder {
    #[inline]
    fn compare(&self, a: &T, b: &T) -> Ordering {
        a.cmp(b)
    }
}

/// Compares values with `PartialEq`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NaturalEq;

impl<T: ?Sized + PartialEq> EqPredicate<T> for NaturalEq {
    #[inline]
    fn equals(&self, a: &T, b: &T) -> bool {
        a == b
    }
}

impl<T: ?Sized, F> Comparator<T> for F
where
    F: Fn(&T, &T) -> Ordering,
{
    #[inline]
    fn compare(&self, a: &T, b: &T) -> Ordering {
        self(a, b)
    }
}

impl<T: ?Sized, F> EqPredicate<T> for F
where
    F: Fn(&T, &T) -> bool,
{
    #[inline]
    fn equals(&self, a: &T, b: &T) -> bool {
        self(a, b)
    }
}
