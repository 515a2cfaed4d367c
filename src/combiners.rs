//! Reusable aggregation functions.
//!
//! A [`CombineFn`] describes an aggregation as `create` / `add_input` /
//! `merge` / `finish`. Any combiner can be plugged into a windowed reducer
//! through [`CombineReduce`](crate::reducer::CombineReduce).

use std::marker::PhantomData;
use std::ops::Add;

pub trait CombineFn<V, A, O>: Send + Sync + 'static {
    fn create(&self) -> A;
    fn add_input(&self, acc: &mut A, v: V);
    fn merge(&self, acc: &mut A, other: A);
    fn finish(&self, acc: A) -> O;
}

/* ===================== Count ===================== */

#[derive(Clone, Copy, Debug, Default)]
pub struct Count;

impl<V> CombineFn<V, u64, u64> for Count {
    fn create(&self) -> u64 { 0 }
    fn add_input(&self, acc: &mut u64, _v: V) { *acc += 1; }
    fn merge(&self, acc: &mut u64, other: u64) { *acc += other; }
    fn finish(&self, acc: u64) -> u64 { acc }
}

/* ===================== Sum<T> ===================== */

#[derive(Clone, Copy, Debug, Default)]
pub struct Sum<T>(pub PhantomData<T>);
impl<T> Sum<T> { pub fn new() -> Self { Self(PhantomData) } }

impl<T> CombineFn<T, T, T> for Sum<T>
where
    T: 'static + Send + Sync + Add<Output = T> + Default,
{
    fn create(&self) -> T { T::default() }

    fn add_input(&self, acc: &mut T, v: T) {
        *acc = std::mem::take(acc) + v;
    }

    fn merge(&self, acc: &mut T, other: T) {
        *acc = std::mem::take(acc) + other;
    }

    fn finish(&self, acc: T) -> T { acc }
}

/* ===================== Min<T> ===================== */

#[derive(Clone, Copy, Debug, Default)]
pub struct Min<T>(pub PhantomData<T>);
impl<T> Min<T> { pub fn new() -> Self { Self(PhantomData) } }

impl<T> CombineFn<T, Option<T>, Option<T>> for Min<T>
where
    T: 'static + Send + Sync + Ord,
{
    fn create(&self) -> Option<T> { None }

    fn add_input(&self, acc: &mut Option<T>, v: T) {
        match acc {
            Some(cur) => if v < *cur { *cur = v },
            None => *acc = Some(v),
        }
    }

    fn merge(&self, acc: &mut Option<T>, other: Option<T>) {
        if let Some(b) = other {
            self.add_input(acc, b);
        }
    }

    fn finish(&self, acc: Option<T>) -> Option<T> { acc }
}

/* ===================== Max<T> ===================== */

#[derive(Clone, Copy, Debug, Default)]
pub struct Max<T>(pub PhantomData<T>);
impl<T> Max<T> { pub fn new() -> Self { Self(PhantomData) } }

impl<T> CombineFn<T, Option<T>, Option<T>> for Max<T>
where
    T: 'static + Send + Sync + Ord,
{
    fn create(&self) -> Option<T> { None }

    fn add_input(&self, acc: &mut Option<T>, v: T) {
        match acc {
            Some(cur) => if v > *cur { *cur = v },
            None => *acc = Some(v),
        }
    }

    fn merge(&self, acc: &mut Option<T>, other: Option<T>) {
        if let Some(b) = other {
            self.add_input(acc, b);
        }
    }

    fn finish(&self, acc: Option<T>) -> Option<T> { acc }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn min_max_merge_partials() {
        let min = Min::<i32>::new();
        let mut a = min.create();
        min.add_input(&mut a, 4);
        let mut b = min.create();
        min.add_input(&mut b, 2);
        min.merge(&mut a, b);
        assert_eq!(min.finish(a), Some(2));

        let max = Max::<i32>::new();
        let mut a = max.create();
        max.merge(&mut a, None);
        assert_eq!(max.finish(a), None);
    }
}
