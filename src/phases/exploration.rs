//! 探索フェーズ: 固定順序のウェイポイントを位置指令で巡回します。
//!
//! 到達判定（`distance < arrival_radius`）とカーソル前進はスケジューラが
//! 行い、ここでは現在のカーソルが指すウェイポイントをそのまま指令します。

use super::PhaseContext;
use crate::output::{ControlIntent, Setpoint};

pub fn compute_setpoint(ctx: &PhaseContext) -> ControlIntent {
    let target = &ctx.waypoint.state;
    ControlIntent::new(Setpoint::Position {
        position: target.position,
        yaw: target.heading,
    })
}
