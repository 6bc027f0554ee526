//! 追尾フェーズ: 主対象RGVの推定位置と進行方向を姿勢＋推力指令で追います。

use super::{PhaseContext, track_point};
use crate::output::ControlIntent;

pub fn compute_setpoint(ctx: &PhaseContext) -> ControlIntent {
    let target = ctx.tracker(ctx.primary).estimate();
    track_point(ctx.uas, target, ctx.guidance.trailing_altitude, ctx.guidance)
}
