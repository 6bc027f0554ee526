//! 2台同時追尾フェーズ: 位置特定の信頼度が低い方のRGVを追い、
//! 信頼度が同じ場合は近い方を追います。

use super::{PhaseContext, track_point};
use crate::models::rgv_track::RgvId;
use crate::output::ControlIntent;

const CONFIDENCE_TIE_EPSILON: f64 = 1e-9;

pub fn compute_setpoint(ctx: &PhaseContext) -> ControlIntent {
    let focus = select_focus(ctx);
    let target = ctx.tracker(focus).estimate();
    track_point(ctx.uas, target, ctx.guidance.joint_altitude, ctx.guidance)
}

/// 追尾対象の選択
pub fn select_focus(ctx: &PhaseContext) -> RgvId {
    let [a, b] = ctx.trackers;
    let conf_a = a.localization_confidence(ctx.now);
    let conf_b = b.localization_confidence(ctx.now);

    if (conf_a - conf_b).abs() > CONFIDENCE_TIE_EPSILON {
        return if conf_a < conf_b { a.id } else { b.id };
    }

    let dist_a = ctx.uas.position.distance_xy(&a.estimate().position);
    let dist_b = ctx.uas.position.distance_xy(&b.estimate().position);
    if dist_b < dist_a { b.id } else { a.id }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{common::Position3D, rgv_track::RgvTracker, vehicle_state::Waypoint};
    use crate::phases::test_support::*;

    /// 停止したRGVを与え続け、指定時刻までの窓を進める
    fn hold(trackers: &mut [RgvTracker; 2], until: f64, both: bool) {
        let positions = [Position3D::new(20.0, 0.0, 0.0), Position3D::new(-5.0, 0.0, 0.0)];
        let steps = (until / 0.25).round() as usize;
        for i in 0..=steps {
            let t = i as f64 * 0.25;
            for (tracker, position) in trackers.iter_mut().zip(positions) {
                tracker.update_from_detection(position, t);
            }
            for tracker in trackers.iter_mut() {
                tracker.refresh_localization(t, both);
            }
        }
    }

    fn focus(trackers: &[RgvTracker; 2], now: f64) -> RgvId {
        let guidance = guidance();
        let uas = uas_at(0.0, 0.0, 15.0);
        let waypoint = Waypoint::new(0, Position3D::from_altitude(0.0, 0.0, 20.0));
        let ctx = PhaseContext {
            now,
            uas: &uas,
            trackers,
            primary: RgvId::One,
            waypoint: &waypoint,
            guidance: &guidance,
        };
        select_focus(&ctx)
    }

    #[test]
    fn test_tie_goes_to_nearer_target() {
        let mut trackers = trackers();
        hold(&mut trackers, 20.0, true);
        assert!(trackers.iter().all(|t| t.is_joint_localized(20.0)));
        // RGV2 の方が近い
        assert_eq!(focus(&trackers, 20.0), RgvId::Two);
    }

    #[test]
    fn test_lower_confidence_target_is_selected() {
        let mut trackers = trackers();
        hold(&mut trackers, 20.0, true);
        // RGV2 だけ新しいトラッカーに差し替え、信頼度を下げる
        trackers[1] = RgvTracker::new(RgvId::Two, tracker_params());
        trackers[1].update_from_detection(Position3D::new(-5.0, 0.0, 0.0), 20.0);
        assert_eq!(focus(&trackers, 20.0), RgvId::Two);
    }

    #[test]
    fn test_lower_confidence_wins_over_distance() {
        let mut trackers = trackers();
        hold(&mut trackers, 20.0, true);
        trackers[0] = RgvTracker::new(RgvId::One, tracker_params());
        trackers[0].update_from_detection(Position3D::new(20.0, 0.0, 0.0), 20.0);
        assert_eq!(focus(&trackers, 20.0), RgvId::One);
    }
}
