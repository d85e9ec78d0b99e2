// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Behavior both engines must share, checked through `dyn SpatialIndex`.

use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;

use kurbo::{Point, Rect};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::{BucketGrid, Handle, MaxPriorityQueue, QuadTree, SpatialIndex};

type Obj = Rc<Cell<Point>>;

fn obj(x: f64, y: f64) -> Obj {
    Rc::new(Cell::new(Point::new(x, y)))
}

fn bounds() -> Rect {
    Rect::new(0.0, 0.0, 1000.0, 1000.0)
}

fn engines() -> Vec<(&'static str, Box<dyn SpatialIndex<Obj>>)> {
    let tree: Box<dyn SpatialIndex<Obj>> = Box::new(QuadTree::new(bounds()).unwrap());
    let grid: Box<dyn SpatialIndex<Obj>> = Box::new(BucketGrid::new(bounds(), 10, 10).unwrap());
    vec![("quadtree", tree), ("grid", grid)]
}

/// Same members, compared by identity and ignoring order.
fn same_set(got: &[Obj], expected: &[&Obj]) -> bool {
    got.len() == expected.len()
        && got
            .iter()
            .all(|g| expected.iter().any(|e| g.same_object(e)))
}

/// The four-point layout used by most query checks.
fn populate(index: &mut dyn SpatialIndex<Obj>) -> [Obj; 4] {
    let objs = [obj(0.0, 0.0), obj(10.0, 0.0), obj(7.0, 7.0), obj(50.0, 50.0)];
    for o in &objs {
        index.add(o.clone()).unwrap();
    }
    index.update().unwrap();
    objs
}

#[test]
fn count_changes_only_on_update() {
    for (name, mut index) in engines() {
        let one = obj(1.0, 1.0);
        let two = obj(2.0, 2.0);
        assert_eq!(index.len(), 0, "{name}");
        index.update().unwrap();
        assert_eq!(index.len(), 0, "{name}");

        index.add(one.clone()).unwrap();
        assert_eq!(index.len(), 0, "{name}");
        index.update().unwrap();
        assert_eq!(index.len(), 1, "{name}");

        index.add(two.clone()).unwrap();
        index.update().unwrap();
        index.update().unwrap();
        assert_eq!(index.len(), 2, "{name}");

        index.remove(one.clone()).unwrap();
        index.update().unwrap();
        assert_eq!(index.len(), 1, "{name}");
        index.remove(two.clone()).unwrap();
        index.update().unwrap();
        assert!(index.is_empty(), "{name}");

        index.add(one.clone()).unwrap();
        index.add(two.clone()).unwrap();
        assert_eq!(index.len(), 0, "{name}");
        index.update().unwrap();
        assert_eq!(index.len(), 2, "{name}");

        index.remove(one.clone()).unwrap();
        index.remove(two.clone()).unwrap();
        assert_eq!(index.len(), 2, "{name}");
        index.update().unwrap();
        assert_eq!(index.len(), 0, "{name}");

        // Removing something that was never added is a no-op.
        index.add(one.clone()).unwrap();
        index.remove(two).unwrap();
        index.update().unwrap();
        assert_eq!(index.len(), 1, "{name}");

        let bad = obj(f64::NAN, 0.0);
        assert!(index.add(bad.clone()).is_err(), "{name}");
        assert!(index.remove(bad).is_err(), "{name}");
    }
}

#[test]
fn k_closest_objects() {
    for (name, mut index) in engines() {
        let objs = populate(index.as_mut());
        let knn = |p: Point, k: usize, range: f64| index.k_closest(p, k, range).unwrap();

        assert!(same_set(&knn(Point::new(1.0, 1.0), 1, f64::INFINITY), &[&objs[0]]), "{name}");
        assert!(
            same_set(&knn(Point::new(1.0, 1.0), 3, f64::INFINITY), &[&objs[0], &objs[1], &objs[2]]),
            "{name}"
        );
        assert!(
            same_set(&knn(Point::new(51.0, 51.0), 3, f64::INFINITY), &[&objs[1], &objs[2], &objs[3]]),
            "{name}"
        );
        assert!(same_set(&knn(Point::new(51.0, 51.0), 3, 10.0), &[&objs[3]]), "{name}");
        assert!(knn(Point::new(1.0, 1.0), 0, f64::INFINITY).is_empty(), "{name}");
        assert!(index.k_closest(Point::new(51.0, 51.0), 3, -10.0).is_err(), "{name}");

        // Nearest first.
        let ordered = knn(Point::new(1.0, 1.0), 4, f64::INFINITY);
        assert!(ordered[0].same_object(&objs[0]), "{name}");
        assert!(ordered[3].same_object(&objs[3]), "{name}");

        let mut queue = MaxPriorityQueue::new();
        index
            .k_closest_into(Point::new(51.0, 51.0), 3, 10.0, &mut queue)
            .unwrap();
        assert!(same_set(&queue.to_vec(), &[&objs[3]]), "{name}");
        queue.clear();
        index
            .k_closest_into(Point::new(1.0, 1.0), 3, f64::INFINITY, &mut queue)
            .unwrap();
        assert!(same_set(&queue.to_vec(), &[&objs[0], &objs[1], &objs[2]]), "{name}");
        let (farthest, d2) = queue.peek().unwrap();
        assert!(farthest.same_object(&objs[1]), "{name}");
        assert_eq!(d2, 82.0, "{name}");
    }
}

#[test]
fn reused_k_closest_queue_respects_the_new_k() {
    for (name, mut index) in engines() {
        let objs = populate(index.as_mut());
        let extra = obj(3.0, 3.0);
        index.add(extra.clone()).unwrap();
        index.update().unwrap();

        let mut queue = MaxPriorityQueue::new();
        index
            .k_closest_into(Point::new(1.0, 1.0), 5, f64::INFINITY, &mut queue)
            .unwrap();
        assert_eq!(queue.len(), 5, "{name}");
        index
            .k_closest_into(Point::new(1.0, 1.0), 3, f64::INFINITY, &mut queue)
            .unwrap();
        assert_eq!(queue.len(), 3, "{name}");
        assert!(same_set(&queue.to_vec(), &[&objs[0], &extra, &objs[2]]), "{name}");

        index
            .k_closest_into(Point::new(1.0, 1.0), 0, f64::INFINITY, &mut queue)
            .unwrap();
        assert!(queue.is_empty(), "{name}");
    }
}

#[test]
fn k_closest_handles_k_larger_than_the_index() {
    for (name, mut index) in engines() {
        populate(index.as_mut());
        let all = index.k_closest(Point::ZERO, 1_000_000, f64::INFINITY).unwrap();
        assert_eq!(all.len(), 4, "{name}");
    }
}

#[test]
fn objects_in_range() {
    for (name, mut index) in engines() {
        let objs = populate(index.as_mut());
        let r = |p: Point, range: f64| index.in_range(p, range).unwrap();

        assert!(r(Point::new(-1.0, -1.0), 1.0).is_empty(), "{name}");
        assert!(same_set(&r(Point::ZERO, 5.0), &[&objs[0]]), "{name}");
        assert!(
            same_set(&r(Point::new(5.0, 5.0), 10.0), &[&objs[0], &objs[1], &objs[2]]),
            "{name}"
        );
        assert!(
            same_set(&r(Point::new(5.0, 5.0), f64::INFINITY), &[&objs[0], &objs[1], &objs[2], &objs[3]]),
            "{name}"
        );
        // Inclusive boundary.
        assert!(same_set(&r(Point::new(10.0, -5.0), 5.0), &[&objs[1]]), "{name}");
        assert!(index.in_range(Point::ZERO, -5.0).is_err(), "{name}");

        // Fill-into forms append without clearing.
        let mut list = vec![objs[3].clone()];
        index.in_range_into(Point::ZERO, 5.0, &mut list).unwrap();
        assert!(same_set(&list, &[&objs[3], &objs[0]]), "{name}");
    }
}

#[test]
fn objects_in_rect() {
    for (name, mut index) in engines() {
        let objs = populate(index.as_mut());
        let q = |x: f64, y: f64, w: f64, h: f64| {
            index.in_rect(Rect::from_origin_size((x, y), (w, h)))
        };

        assert!(q(-1.0, -1.0, 0.0, 0.0).is_empty(), "{name}");
        assert!(same_set(&q(8.0, -1.0, 7.0, 7.0), &[&objs[1]]), "{name}");
        assert!(
            same_set(&q(-1.0, -1.0, 15.0, 20.0), &[&objs[0], &objs[1], &objs[2]]),
            "{name}"
        );
        assert!(
            same_set(&q(-1.0, -1.0, 60.0, 60.0), &[&objs[0], &objs[1], &objs[2], &objs[3]]),
            "{name}"
        );
        // Flipped rectangles are normalized.
        assert!(
            same_set(&index.in_rect(Rect::new(15.0, 6.0, 8.0, -1.0)), &[&objs[1]]),
            "{name}"
        );

        let mut list = Vec::new();
        index.in_rect_into(Rect::new(-1.0, -1.0, 14.0, 19.0), &mut list);
        assert!(same_set(&list, &[&objs[0], &objs[1], &objs[2]]), "{name}");
    }
}

#[test]
fn closest_object() {
    for (name, mut index) in engines() {
        let objs = populate(index.as_mut());
        let c = |p: Point, max: f64| index.closest(p, max).unwrap();

        assert!(c(Point::ZERO, f64::INFINITY).unwrap().same_object(&objs[0]), "{name}");
        assert!(c(Point::new(5.0, 5.0), f64::INFINITY).unwrap().same_object(&objs[2]), "{name}");
        assert!(c(Point::new(5.0, 5.0), 1.0).is_none(), "{name}");
        assert!(c(Point::new(-1.0, -1.0), f64::INFINITY).unwrap().same_object(&objs[0]), "{name}");
        assert!(c(Point::new(2000.0, 2000.0), f64::INFINITY).unwrap().same_object(&objs[3]), "{name}");
        assert!(index.closest(Point::ZERO, -1.0).is_err(), "{name}");
        assert!(index.closest(Point::ZERO, f64::NAN).is_err(), "{name}");
    }
}

#[test]
fn moved_objects_are_found_at_their_new_position() {
    for (name, mut index) in engines() {
        let objs = populate(index.as_mut());
        objs[3].set(Point::new(900.0, 100.0));
        index.update().unwrap();
        assert_eq!(index.len(), 4, "{name}");
        assert!(index.in_range(Point::new(50.0, 50.0), 1.0).unwrap().is_empty(), "{name}");
        let found = index.closest(Point::new(899.0, 101.0), 5.0).unwrap();
        assert!(found.unwrap().same_object(&objs[3]), "{name}");
        let everything = index.in_rect(Rect::new(-1e9, -1e9, 1e9, 1e9));
        assert_eq!(everything.len(), 4, "{name}");
    }
}

#[test]
fn clear_empties_the_index() {
    for (name, mut index) in engines() {
        populate(index.as_mut());
        index.add(obj(1.0, 2.0)).unwrap();
        index.clear();
        index.update().unwrap();
        assert!(index.is_empty(), "{name}");
        assert!(index.closest(Point::ZERO, f64::INFINITY).unwrap().is_none(), "{name}");
    }
}

#[test]
fn queries_are_stable_across_idle_updates() {
    for (name, mut index) in engines() {
        populate(index.as_mut());
        let before = index.in_range(Point::new(5.0, 5.0), 10.0).unwrap();
        for _ in 0..3 {
            index.update().unwrap();
        }
        let after = index.in_range(Point::new(5.0, 5.0), 10.0).unwrap();
        let expected: Vec<&Obj> = before.iter().collect();
        assert!(same_set(&after, &expected), "{name}");
    }
}

fn random_objects(rng: &mut StdRng, n: usize) -> Vec<Obj> {
    (0..n)
        .map(|_| obj(rng.random::<f64>() * 1000.0, rng.random::<f64>() * 1000.0))
        .collect()
}

fn random_point(rng: &mut StdRng) -> Point {
    Point::new(rng.random_range(-100.0..1100.0), rng.random_range(-100.0..1100.0))
}

fn build_both(objs: &[Obj]) -> (QuadTree<Obj>, BucketGrid<Obj>) {
    let mut tree = QuadTree::new(bounds()).unwrap();
    let mut grid = BucketGrid::new(bounds(), 10, 10).unwrap();
    for o in objs {
        tree.add(o.clone()).unwrap();
        grid.add(o.clone()).unwrap();
    }
    tree.update().unwrap();
    grid.update().unwrap();
    (tree, grid)
}

#[test]
fn engines_agree_on_range_queries() {
    let mut rng = StdRng::seed_from_u64(0x5EED);
    let objs = random_objects(&mut rng, 200);
    let (tree, grid) = build_both(&objs);
    for _ in 0..1000 {
        let p = random_point(&mut rng);
        let range = rng.random_range(0.0..250.0);
        let a = tree.in_range(p, range).unwrap();
        let b = grid.in_range(p, range).unwrap();
        let expected: Vec<&Obj> = objs
            .iter()
            .filter(|o| (o.get() - p).hypot2() <= range * range)
            .collect();
        assert!(same_set(&a, &expected), "quadtree at {p:?} r={range}");
        assert!(same_set(&b, &expected), "grid at {p:?} r={range}");
    }
}

#[test]
fn engines_agree_on_k_closest() {
    let mut rng = StdRng::seed_from_u64(42);
    let objs = random_objects(&mut rng, 200);
    let (tree, grid) = build_both(&objs);
    for _ in 0..300 {
        let p = random_point(&mut rng);
        let k = rng.random_range(1..12);
        let range = if rng.random::<bool>() {
            f64::INFINITY
        } else {
            rng.random_range(10.0..200.0)
        };
        let a = tree.k_closest(p, k, range).unwrap();
        let b = grid.k_closest(p, k, range).unwrap();
        let within = objs
            .iter()
            .filter(|o| (o.get() - p).hypot2() <= range * range)
            .count();
        assert_eq!(a.len(), k.min(within), "quadtree at {p:?}");
        let expected: Vec<&Obj> = a.iter().collect();
        assert!(same_set(&b, &expected), "grid disagrees at {p:?} k={k}");

        let nearest_tree = tree.closest(p, range).unwrap();
        let nearest_grid = grid.closest(p, range).unwrap();
        match (nearest_tree, nearest_grid) {
            (Some(x), Some(y)) => assert!(x.same_object(&y), "closest at {p:?}"),
            (None, None) => {}
            other => panic!("closest disagrees at {p:?}: {other:?}"),
        }
    }
}

#[test]
fn mutators_queue_from_other_threads() {
    let mut tree = QuadTree::<Arc<Point>>::new(bounds()).unwrap();
    let mut grid = BucketGrid::<Arc<Point>>::new(bounds(), 4, 4).unwrap();
    let to_tree = tree.mutator();
    let to_grid = grid.mutator();

    std::thread::scope(|s| {
        for t in 0..4 {
            let to_tree = to_tree.clone();
            let to_grid = to_grid.clone();
            s.spawn(move || {
                for i in 0..25 {
                    let p = Arc::new(Point::new(
                        f64::from(t) * 200.0 + 50.0,
                        f64::from(i) * 30.0 + 5.0,
                    ));
                    to_tree.add(p.clone()).unwrap();
                    to_grid.add(p).unwrap();
                }
            });
        }
        // Updating while producers are still sending is allowed.
        for _ in 0..10 {
            tree.update().unwrap();
            grid.update().unwrap();
        }
    });

    tree.update().unwrap();
    grid.update().unwrap();
    assert_eq!(tree.len(), 100);
    assert_eq!(grid.len(), 100);
}
