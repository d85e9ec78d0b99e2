// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Basic usage of Understory Proximity: add, update, move, and query.

use std::cell::Cell;
use std::rc::Rc;

use kurbo::{Point, Rect};
use understory_proximity::{IndexError, QuadTree, SpatialIndex};

fn main() {
    let mut tree = QuadTree::new(Rect::new(0.0, 0.0, 1000.0, 1000.0)).unwrap();
    let a = Rc::new(Cell::new(Point::new(0.0, 0.0)));
    let b = Rc::new(Cell::new(Point::new(10.0, 0.0)));
    let c = Rc::new(Cell::new(Point::new(7.0, 7.0)));
    for o in [&a, &b, &c] {
        tree.add(o.clone()).unwrap();
    }
    tree.update().unwrap();

    let nearest = tree.k_closest(Point::new(1.0, 1.0), 2, f64::INFINITY).unwrap();
    println!("two closest to (1,1): {:?}", nearest.iter().map(|o| o.get()).collect::<Vec<_>>());

    // Move `c` far away; the tree notices on the next update.
    c.set(Point::new(900.0, 900.0));
    tree.update().unwrap();
    println!("within 15 of (5,5): {}", tree.in_range(Point::new(5.0, 5.0), 15.0).unwrap().len());

    // Leaving the region evicts the object and reports it.
    b.set(Point::new(-5.0, 0.0));
    match tree.update() {
        Err(IndexError::OutsideRegion { count, first, .. }) => {
            println!("evicted {count} object(s), first at {first:?}");
        }
        other => println!("unexpected: {other:?}"),
    }
    println!("objects left: {}", tree.len());
}
