use crate::{Vec2, config::WarehouseConfig, physics::Boundary};

/// Static positions of every pickup point, delivery point and wall.
#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    pub world_dimension: f32,
    pub border_width: f32,
    pub agent_initial_positions: Vec<Vec2>,
    pub pickup_positions: Vec<Vec2>,
    pub delivery_positions: Vec<Vec2>,
    pub boundaries: Vec<Boundary>,
}

impl Layout {
    pub fn from_config(config: &WarehouseConfig) -> Self {
        let border = config.border_width;
        let world = config.world_dimension();

        let agent_initial_positions = config
            .agent_initial_positions
            .iter()
            .map(|&[x, y]| Vec2::new(x + border, y + border))
            .collect();

        // Four points around every rack crossing.
        let mut pickup_positions = Vec::with_capacity(config.num_pickup_points());
        for &x in &config.pickup_racks_arrangement {
            for &y in &config.pickup_racks_arrangement {
                let (x, y) = (x + border, y + border);
                pickup_positions.extend([
                    Vec2::new(x - 0.5, y - 0.5),
                    Vec2::new(x + 0.5, y - 0.5),
                    Vec2::new(x + 0.5, y + 0.5),
                    Vec2::new(x - 0.5, y + 0.5),
                ]);
            }
        }

        // Delivery points line the walls, leaving the corners free.
        let mut delivery_positions = Vec::with_capacity(config.num_delivery_points());
        let cells = config.area_dimension.floor() as usize;
        for v in 2..cells.saturating_sub(2) {
            let along = border + v as f32 + 0.5;
            delivery_positions.extend([
                Vec2::new(along, border + 0.5),
                Vec2::new(along, world - border - 0.5),
                Vec2::new(border + 0.5, along),
                Vec2::new(world - border - 0.5, along),
            ]);
        }

        let half_world = world / 2.0;
        let half_border = border / 2.0;
        let boundaries = if border > 0.0 {
            vec![
                Boundary::new(
                    Vec2::new(half_world, half_border),
                    Vec2::new(half_world, half_border),
                ),
                Boundary::new(
                    Vec2::new(half_world, world - half_border),
                    Vec2::new(half_world, half_border),
                ),
                Boundary::new(
                    Vec2::new(half_border, half_world),
                    Vec2::new(half_border, half_world),
                ),
                Boundary::new(
                    Vec2::new(world - half_border, half_world),
                    Vec2::new(half_border, half_world),
                ),
            ]
        } else {
            Vec::new()
        };

        Layout {
            world_dimension: world,
            border_width: border,
            agent_initial_positions,
            pickup_positions,
            delivery_positions,
            boundaries,
        }
    }
}
