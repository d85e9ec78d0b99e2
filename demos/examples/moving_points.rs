// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Moving points.
//!
//! Drive a cloud of bouncing points for a few frames, update both engines once per
//! frame, and compare what each one reports around the first point.
//!
//! Run:
//! - `RUST_LOG=understory_proximity=trace cargo run -p understory_proximity_demos --example moving_points`

use std::cell::Cell;
use std::rc::Rc;

use kurbo::{Point, Rect, Vec2};
use understory_proximity::{BucketGrid, Positioned, QuadTree, SpatialIndex};

const FRAMES: usize = 120;
const BODIES: usize = 400;

#[derive(Debug)]
struct Body {
    pos: Cell<Point>,
    vel: Cell<Vec2>,
}

impl Positioned for Body {
    fn position(&self) -> Point {
        self.pos.get()
    }
}

impl Body {
    /// Advance one step, reflecting off the edges of `bounds`.
    fn step(&self, bounds: Rect, dt: f64) {
        let mut p = self.pos.get() + self.vel.get() * dt;
        let mut v = self.vel.get();
        if p.x < bounds.x0 || p.x >= bounds.x1 {
            v.x = -v.x;
            p.x = p.x.clamp(bounds.x0, bounds.x1 - 1.0);
        }
        if p.y < bounds.y0 || p.y >= bounds.y1 {
            v.y = -v.y;
            p.y = p.y.clamp(bounds.y0, bounds.y1 - 1.0);
        }
        self.pos.set(p);
        self.vel.set(v);
    }
}

fn main() {
    tracing_subscriber::fmt::init();

    let bounds = Rect::new(0.0, 0.0, 1024.0, 1024.0);
    let mut tree = QuadTree::new(bounds).unwrap();
    let mut grid = BucketGrid::new(bounds, 32, 32).unwrap();

    // Deterministic spiral layout with varied velocities.
    let bodies: Vec<Rc<Body>> = (0..BODIES)
        .map(|i| {
            let t = i as f64 * 0.37;
            let r = 20.0 + i as f64;
            let center = bounds.center();
            let pos = center + Vec2::new(t.cos(), t.sin()) * r.min(500.0);
            Rc::new(Body {
                pos: Cell::new(pos),
                vel: Cell::new(Vec2::new((t * 1.3).sin(), (t * 0.7).cos()) * 90.0),
            })
        })
        .collect();
    for b in &bodies {
        tree.add(b.clone()).unwrap();
        grid.add(b.clone()).unwrap();
    }

    let probe = bodies[0].clone();
    for frame in 0..FRAMES {
        for b in &bodies {
            b.step(bounds, 1.0 / 60.0);
        }
        tree.update().unwrap();
        grid.update().unwrap();

        if frame % 30 == 0 {
            let at = probe.position();
            let near_tree = tree.in_range(at, 40.0).unwrap();
            let near_grid = grid.in_range(at, 40.0).unwrap();
            assert_eq!(near_tree.len(), near_grid.len(), "engines disagree");

            let neighbors: Vec<Point> = tree
                .k_closest(at, 4, f64::INFINITY)
                .unwrap()
                .iter()
                .skip(1)
                .map(|b| b.position())
                .collect();
            let mut regions = Vec::new();
            tree.regions(&mut regions);
            tracing::info!(
                frame,
                near = near_tree.len(),
                nearest = ?neighbors,
                quadtree_regions = regions.len(),
                "probe at {at:?}"
            );
        }
    }

    // Removing half of the bodies only takes effect on the next update.
    for b in bodies.iter().step_by(2) {
        tree.remove(b.clone()).unwrap();
        grid.remove(b.clone()).unwrap();
    }
    println!("before update: tree={} grid={}", tree.len(), grid.len());
    tree.update().unwrap();
    grid.update().unwrap();
    println!("after update: tree={} grid={}", tree.len(), grid.len());
}
