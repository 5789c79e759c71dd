//! Spherical block queries.

use crate::{
    math::Point,
    world::{Instance, WorldBlock},
};

/// Offsets within `radius` of the origin.
///
/// Each axis steps by 1.0 from `-radius` up to `radius`, so a fractional
/// radius yields fractional offsets. Points are unique.
pub fn blocks_in_sphere(radius: f64) -> Vec<Point> {
    let mut points = Vec::new();
    if !radius.is_finite() || radius < 0.0 {
        return points;
    }
    let r_sq = radius * radius;

    let mut x = -radius;
    while x <= radius {
        let mut y = -radius;
        while y <= radius {
            let mut z = -radius;
            while z <= radius {
                if x * x + y * y + z * z <= r_sq {
                    points.push(Point::new(x, y, z));
                }
                z += 1.0;
            }
            y += 1.0;
        }
        x += 1.0;
    }
    points
}

/// Blocks at `position + offset` for every offset that pass `predicate`.
pub fn nearby_blocks<F>(
    position: Point,
    instance: &Instance,
    offsets: &[Point],
    mut predicate: F,
) -> Vec<WorldBlock>
where
    F: FnMut(&WorldBlock) -> bool,
{
    offsets
        .iter()
        .map(|offset| {
            let pos = offset.add(position);
            WorldBlock {
                pos,
                block: instance.get_block(pos),
            }
        })
        .filter(|wb| predicate(wb))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{math::BlockPos, world::Block};

    #[test]
    fn unit_radius_is_a_plus_shape() {
        let points = blocks_in_sphere(1.0);
        assert_eq!(points.len(), 7);
        assert!(points.contains(&Point::ZERO));
        assert!(points.contains(&Point::new(0.0, -1.0, 0.0)));
        assert!(!points.contains(&Point::new(1.0, 1.0, 0.0)));
    }

    #[test]
    fn degenerate_radii() {
        assert_eq!(blocks_in_sphere(0.0), vec![Point::ZERO]);
        assert!(blocks_in_sphere(-1.0).is_empty());
        assert!(blocks_in_sphere(f64::NAN).is_empty());
    }

    #[test]
    fn radius_two_count() {
        // Lattice points with x²+y²+z² <= 4.
        assert_eq!(blocks_in_sphere(2.0).len(), 33);
    }

    #[test]
    fn fractional_radius_gives_fractional_offsets() {
        let points = blocks_in_sphere(1.5);
        assert_eq!(points.len(), 8);
        assert!(points.contains(&Point::new(-0.5, -0.5, -0.5)));
        assert!(points.iter().all(|p| p.x.abs() == 0.5 && p.z.abs() == 0.5));
    }

    #[test]
    fn nearby_blocks_filters_by_predicate() {
        let mut instance = Instance::new();
        instance.set_block(BlockPos::new(10, 4, 10), Block::stone());
        let centre = Point::new(10.5, 5.5, 10.5);

        let offsets = blocks_in_sphere(1.0);
        let all = nearby_blocks(centre, &instance, &offsets, |_| true);
        assert_eq!(all.len(), offsets.len());

        let solid = nearby_blocks(centre, &instance, &offsets, |wb| wb.block.is_solid());
        assert_eq!(solid.len(), 1);
        assert_eq!(solid[0].pos.block_pos(), BlockPos::new(10, 4, 10));
    }
}
