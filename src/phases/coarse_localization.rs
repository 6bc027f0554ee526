//! 粗位置特定フェーズ: 速度指令で主対象RGVの最終推定位置の上空へ
//! 一定速度で接近し、目標高度まで一定速度で降下します。
//!
//! 探索ウェイポイントとは無関係に動作します。

use super::PhaseContext;
use crate::models::common::Velocity3D;
use crate::output::{ControlIntent, Setpoint};

pub fn compute_setpoint(ctx: &PhaseContext) -> ControlIntent {
    let guidance = ctx.guidance;
    let uas = &ctx.uas.position;
    let target = &ctx.tracker(ctx.primary).estimate().position;

    let dx = target.x - uas.x;
    let dy = target.y - uas.y;
    let range = (dx * dx + dy * dy).sqrt();
    let (vx, vy) = if range > guidance.hover_radius {
        (dx / range * guidance.coarse_speed, dy / range * guidance.coarse_speed)
    } else {
        (0.0, 0.0)
    };

    // NEDなので下向きが正
    let altitude_error = ctx.uas.altitude() - guidance.coarse_altitude;
    let vz = if altitude_error > guidance.altitude_tolerance {
        guidance.coarse_descent_speed
    } else if altitude_error < -guidance.altitude_tolerance {
        -guidance.coarse_descent_speed
    } else {
        0.0
    };

    ControlIntent::new(Setpoint::Velocity {
        velocity: Velocity3D::new(vx, vy, vz),
    })
}
