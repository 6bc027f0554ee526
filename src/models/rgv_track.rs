use std::collections::VecDeque;
use std::fmt;
use crate::models::{
    common::{Position3D, Velocity3D},
    vehicle_state::VehicleState,
};
use tracing::{info, debug};

/// 追跡対象RGVの識別子
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RgvId {
    One,
    Two,
}

impl RgvId {
    pub const ALL: [RgvId; 2] = [RgvId::One, RgvId::Two];

    /// 配列インデックス（0または1）
    pub fn index(self) -> usize {
        match self {
            RgvId::One => 0,
            RgvId::Two => 1,
        }
    }

    /// もう一方のRGV
    pub fn other(self) -> RgvId {
        match self {
            RgvId::One => RgvId::Two,
            RgvId::Two => RgvId::One,
        }
    }

    /// 設定ファイル上の番号（1または2）から変換
    pub fn from_number(n: u32) -> Option<RgvId> {
        match n {
            1 => Some(RgvId::One),
            2 => Some(RgvId::Two),
            _ => None,
        }
    }

    pub fn number(self) -> u32 {
        self.index() as u32 + 1
    }
}

impl fmt::Display for RgvId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rgv{}", self.number())
    }
}

/// トラッカーの状態
///
/// `Stopped`は独立したフラグとして`stopped`で表します。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TrackStatus {
    Unseen,
    Visible,
    CoarseLocalized,
    JointLocalized,
}

/// トラッカーのしきい値パラメータ
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackerParams {
    /// 停止判定速度しきい値（m/s）
    pub stop_velocity_thresh: f64,
    /// 停止判定時間しきい値（秒）
    pub stop_time_thresh: f64,
    /// 粗位置特定に必要な継続時間（秒）
    pub coarse_localization_time: f64,
    /// 精密（同時）位置特定に必要な継続時間（秒）
    pub fine_localization_time: f64,
    /// 位置推定の信頼窓半径（m）
    pub localization_window_radius: f64,
    /// 速度推定に使う履歴サンプル数
    pub velocity_window: usize,
}

/// 位置特定の計時窓（開始時刻とアンカー位置）
#[derive(Debug, Clone, Copy, PartialEq)]
struct LocalizationWindow {
    start: f64,
    anchor: Position3D,
}

impl LocalizationWindow {
    fn elapsed(&self, now: f64) -> f64 {
        (now - self.start).max(0.0)
    }
}

/// 1台のRGVの追跡状態
///
/// 推定状態、速度推定用の短い位置履歴、最後に移動していた時刻、
/// 粗/同時位置特定の計時窓とラッチ、フレーム内フラグを保持します。
/// `last_moving_time`は再初期化（初回検出、フレーム外からの再捕捉）を
/// 除いて単調非減少です。
#[derive(Debug, Clone)]
pub struct RgvTracker {
    pub id: RgvId,
    pub params: TrackerParams,
    estimate: VehicleState,
    history: VecDeque<(f64, Position3D)>,
    last_moving_time: Option<f64>,
    last_detection_time: Option<f64>,
    in_frame: bool,
    coarse_window: Option<LocalizationWindow>,
    coarse_localized_at: Option<f64>,
    joint_window: Option<LocalizationWindow>,
    joint_localized_at: Option<f64>,
}

impl RgvTracker {
    pub fn new(id: RgvId, params: TrackerParams) -> Self {
        Self {
            id,
            params,
            estimate: VehicleState::default(),
            history: VecDeque::with_capacity(params.velocity_window.max(2)),
            last_moving_time: None,
            last_detection_time: None,
            in_frame: false,
            coarse_window: None,
            coarse_localized_at: None,
            joint_window: None,
            joint_localized_at: None,
        }
    }

    /// 検出結果による推定状態の更新
    ///
    /// 位置を更新し、履歴窓の差分で速度を推定します。速度が停止しきい値
    /// 以上なら`last_moving_time`を進めます。初回検出とフレーム外からの
    /// 再捕捉では履歴と`last_moving_time`を再初期化します。
    /// 既に処理した時刻以前の検出は無視します。
    pub fn update_from_detection(&mut self, position: Position3D, timestamp: f64) {
        if self.last_detection_time.is_some_and(|t| timestamp <= t) {
            return;
        }

        if !self.in_frame {
            self.history.clear();
            self.last_moving_time = Some(timestamp);
            debug!(
                rgv = %self.id,
                timestamp,
                position_x = position.x,
                position_y = position.y,
                "RGV_ACQUIRED: RGVをフレーム内で捕捉しました"
            );
        }

        self.history.push_back((timestamp, position));
        while self.history.len() > self.params.velocity_window.max(2) {
            self.history.pop_front();
        }

        let velocity = self.windowed_velocity();
        self.estimate.position = position;
        self.estimate.velocity = velocity;
        if velocity.magnitude_xy() >= self.params.stop_velocity_thresh {
            self.estimate.heading = velocity.y.atan2(velocity.x);
        }

        if velocity.magnitude() >= self.params.stop_velocity_thresh {
            self.last_moving_time = Some(self.last_moving_time.map_or(timestamp, |t| t.max(timestamp)));
        }

        self.last_detection_time = Some(timestamp);
        self.in_frame = true;
    }

    fn windowed_velocity(&self) -> Velocity3D {
        match (self.history.front(), self.history.back()) {
            (Some((t0, p0)), Some((t1, p1))) if t1 > t0 => {
                let dt = t1 - t0;
                Velocity3D::new((p1.x - p0.x) / dt, (p1.y - p0.y) / dt, (p1.z - p0.z) / dt)
            }
            _ => Velocity3D::zero(),
        }
    }

    /// 今ティックで検出が関連付けられなかった場合に呼び出す
    ///
    /// 推定状態はゼロクリアせず最後の値を保持（コースト）します。
    pub fn mark_out_of_frame(&mut self) {
        if self.in_frame {
            debug!(rgv = %self.id, "RGV_LOST: RGVがフレーム外に出ました");
        }
        self.in_frame = false;
    }

    /// 停止判定（デバウンス付き）
    pub fn is_stopped(&self, now: f64) -> bool {
        match self.last_moving_time {
            Some(t) => {
                now - t >= self.params.stop_time_thresh
                    && self.estimate.speed() < self.params.stop_velocity_thresh
            }
            None => false,
        }
    }

    /// 粗位置特定済みかどうか
    pub fn is_coarse_localized(&self, now: f64) -> bool {
        self.coarse_localized_at.is_some()
            || self
                .coarse_window
                .is_some_and(|w| w.elapsed(now) >= self.params.coarse_localization_time)
    }

    /// 同時位置特定済みかどうか
    pub fn is_joint_localized(&self, now: f64) -> bool {
        self.joint_localized_at.is_some()
            || self
                .joint_window
                .is_some_and(|w| w.elapsed(now) >= self.params.fine_localization_time)
    }

    /// 計時窓とラッチの更新（1ティックに1回）
    ///
    /// 粗位置特定の窓はフレーム内かつ停止中に開き、フレーム外・移動・
    /// アンカーからの逸脱で閉じます。同時位置特定の窓は粗位置特定済みで、
    /// 両RGVが同時にフレーム内にあり、停止中の間だけ開きます。
    /// 閉じた窓の経過時間は次の窓に引き継ぎません。
    ///
    /// # 引数
    ///
    /// * `now` - 現在時刻（秒）
    /// * `both_in_frame` - 両RGVが同時にフレーム内にあるか
    pub fn refresh_localization(&mut self, now: f64, both_in_frame: bool) {
        let holding = self.in_frame && self.is_stopped(now);
        let position = self.estimate.position;
        let radius = self.params.localization_window_radius;

        if self.coarse_localized_at.is_none() {
            self.coarse_window = advance_window(self.coarse_window, holding, position, radius, now);
            if self.is_coarse_localized(now) {
                self.coarse_localized_at = Some(now);
                info!(
                    rgv = %self.id,
                    time = now,
                    position_x = position.x,
                    position_y = position.y,
                    "RGV_COARSE_LOCALIZED: RGVの粗位置特定が完了しました"
                );
            }
        }

        if self.coarse_localized_at.is_some() && self.joint_localized_at.is_none() {
            self.joint_window = advance_window(self.joint_window, holding && both_in_frame, position, radius, now);
            if self.is_joint_localized(now) {
                self.joint_localized_at = Some(now);
                info!(
                    rgv = %self.id,
                    time = now,
                    position_x = position.x,
                    position_y = position.y,
                    "RGV_JOINT_LOCALIZED: RGVの同時位置特定が完了しました"
                );
            }
        }
    }

    /// 位置特定の信頼度（0〜1）
    ///
    /// 粗位置特定の進捗を前半0.5、同時位置特定の進捗を後半0.5として
    /// 合成します。
    pub fn localization_confidence(&self, now: f64) -> f64 {
        if self.joint_localized_at.is_some() {
            return 1.0;
        }
        let fraction = |window: Option<LocalizationWindow>, duration: f64| -> f64 {
            match window {
                Some(w) if duration > 0.0 => (w.elapsed(now) / duration).min(1.0),
                Some(_) => 1.0,
                None => 0.0,
            }
        };
        if self.coarse_localized_at.is_some() {
            0.5 + 0.5 * fraction(self.joint_window, self.params.fine_localization_time)
        } else {
            0.5 * fraction(self.coarse_window, self.params.coarse_localization_time)
        }
    }

    /// 現在の追跡状態
    pub fn status(&self, now: f64) -> TrackStatus {
        if self.is_joint_localized(now) {
            TrackStatus::JointLocalized
        } else if self.is_coarse_localized(now) {
            TrackStatus::CoarseLocalized
        } else if self.last_detection_time.is_some() {
            TrackStatus::Visible
        } else {
            TrackStatus::Unseen
        }
    }

    pub fn estimate(&self) -> &VehicleState {
        &self.estimate
    }

    pub fn in_frame(&self) -> bool {
        self.in_frame
    }

    /// 一度でも検出されたか
    pub fn has_been_seen(&self) -> bool {
        self.last_detection_time.is_some()
    }

    pub fn last_detection_time(&self) -> Option<f64> {
        self.last_detection_time
    }
}

/// 計時窓を1ステップ進める
fn advance_window(
    window: Option<LocalizationWindow>,
    holding: bool,
    position: Position3D,
    radius: f64,
    now: f64,
) -> Option<LocalizationWindow> {
    if !holding {
        return None;
    }
    match window {
        Some(w) if w.anchor.distance_3d(&position) <= radius => Some(w),
        _ => Some(LocalizationWindow { start: now, anchor: position }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> TrackerParams {
        TrackerParams {
            stop_velocity_thresh: 0.2,
            stop_time_thresh: 2.0,
            coarse_localization_time: 3.0,
            fine_localization_time: 4.0,
            localization_window_radius: 1.0,
            velocity_window: 5,
        }
    }

    /// start〜endまでdt刻みで等速（x方向）の検出を与え、最後の時刻を返す
    fn feed(tracker: &mut RgvTracker, start: f64, end: f64, dt: f64, speed: f64, both_in_frame: bool) -> f64 {
        let steps = ((end - start) / dt).round() as usize;
        let mut t = start;
        for i in 0..=steps {
            t = start + i as f64 * dt;
            tracker.update_from_detection(Position3D::new(speed * t, 0.0, 0.0), t);
            tracker.refresh_localization(t, both_in_frame);
        }
        t
    }

    #[test]
    fn test_unseen_tracker_is_not_stopped() {
        let tracker = RgvTracker::new(RgvId::One, params());
        assert!(!tracker.is_stopped(100.0));
        assert_eq!(tracker.status(100.0), TrackStatus::Unseen);
        assert_eq!(tracker.localization_confidence(100.0), 0.0);
    }

    #[test]
    fn test_slow_target_reports_stopped_after_stop_time() {
        let mut tracker = RgvTracker::new(RgvId::One, params());
        feed(&mut tracker, 0.0, 2.0, 0.25, 0.1, false);
        assert!(tracker.estimate().speed() < 0.2);
        assert!(tracker.is_stopped(2.0));
    }

    #[test]
    fn test_slow_target_not_stopped_just_before_stop_time() {
        let mut tracker = RgvTracker::new(RgvId::One, params());
        feed(&mut tracker, 0.0, 1.75, 0.25, 0.1, false);
        assert!(!tracker.is_stopped(1.99));
    }

    #[test]
    fn test_moving_target_bumps_last_moving_time() {
        let mut tracker = RgvTracker::new(RgvId::One, params());
        feed(&mut tracker, 0.0, 5.0, 0.25, 1.0, false);
        assert_eq!(tracker.last_moving_time, Some(5.0));
        assert!(!tracker.is_stopped(5.0));
        assert!(tracker.estimate().heading.abs() < 1e-12);
    }

    #[test]
    fn test_out_of_order_detection_is_ignored() {
        let mut tracker = RgvTracker::new(RgvId::One, params());
        tracker.update_from_detection(Position3D::new(1.0, 1.0, 0.0), 2.0);
        tracker.update_from_detection(Position3D::new(9.0, 9.0, 0.0), 1.0);
        assert_eq!(tracker.estimate().position, Position3D::new(1.0, 1.0, 0.0));
        assert_eq!(tracker.last_detection_time(), Some(2.0));
    }

    #[test]
    fn test_out_of_frame_holds_estimate() {
        let mut tracker = RgvTracker::new(RgvId::Two, params());
        tracker.update_from_detection(Position3D::new(4.0, -2.0, 0.0), 1.0);
        tracker.mark_out_of_frame();
        assert!(!tracker.in_frame());
        assert_eq!(tracker.estimate().position, Position3D::new(4.0, -2.0, 0.0));
        assert_eq!(tracker.status(2.0), TrackStatus::Visible);
    }

    #[test]
    fn test_coarse_localization_after_stop_and_coarse_time() {
        let mut tracker = RgvTracker::new(RgvId::One, params());
        // 停止判定まで2秒、その後粗位置特定に3秒
        feed(&mut tracker, 0.0, 4.75, 0.25, 0.0, false);
        assert!(!tracker.is_coarse_localized(4.75));
        feed(&mut tracker, 5.0, 5.0, 0.25, 0.0, false);
        assert!(tracker.is_coarse_localized(5.0));
        assert_eq!(tracker.status(5.0), TrackStatus::CoarseLocalized);
        assert_eq!(tracker.localization_confidence(5.0), 0.5);
    }

    #[test]
    fn test_leaving_frame_resets_coarse_window_without_partial_credit() {
        let mut tracker = RgvTracker::new(RgvId::One, params());
        // 停止(2秒) + 粗位置特定の途中(2.5秒)でフレーム外へ
        feed(&mut tracker, 0.0, 4.5, 0.25, 0.0, false);
        tracker.mark_out_of_frame();
        tracker.refresh_localization(4.6, false);
        assert!(!tracker.is_coarse_localized(4.6));
        assert_eq!(tracker.localization_confidence(4.6), 0.0);

        // 10秒で再捕捉: 停止判定からやり直し
        feed(&mut tracker, 10.0, 14.75, 0.25, 0.0, false);
        assert!(!tracker.is_coarse_localized(14.75));
        feed(&mut tracker, 15.0, 15.0, 0.25, 0.0, false);
        assert!(tracker.is_coarse_localized(15.0));
    }

    #[test]
    fn test_creeping_target_never_coarse_localizes() {
        let mut tracker = RgvTracker::new(
            RgvId::One,
            TrackerParams {
                stop_velocity_thresh: 0.5,
                coarse_localization_time: 5.0,
                ..params()
            },
        );
        // 停止速度未満で這うように移動し、推定が窓半径を外れ続ける
        feed(&mut tracker, 0.0, 8.0, 0.25, 0.3, false);
        assert!(tracker.is_stopped(8.0));
        assert!(!tracker.is_coarse_localized(8.0));
        assert!(tracker.localization_confidence(8.0) < 0.5);
    }

    #[test]
    fn test_joint_localization_requires_both_in_frame() {
        let mut tracker = RgvTracker::new(RgvId::One, params());
        feed(&mut tracker, 0.0, 5.0, 0.25, 0.0, false);
        assert!(tracker.is_coarse_localized(5.0));

        // 片方のみフレーム内では同時位置特定されない
        feed(&mut tracker, 5.25, 20.0, 0.25, 0.0, false);
        assert!(!tracker.is_joint_localized(20.0));
        assert_eq!(tracker.status(20.0), TrackStatus::CoarseLocalized);

        let end = feed(&mut tracker, 20.25, 24.25, 0.25, 0.0, true);
        assert!(tracker.is_joint_localized(end));
        assert_eq!(tracker.localization_confidence(end), 1.0);
        assert_eq!(tracker.status(end), TrackStatus::JointLocalized);
    }

    #[test]
    fn test_latched_localization_survives_leaving_frame() {
        let mut tracker = RgvTracker::new(RgvId::One, params());
        feed(&mut tracker, 0.0, 5.0, 0.25, 0.0, false);
        tracker.mark_out_of_frame();
        tracker.refresh_localization(6.0, false);
        assert!(tracker.is_coarse_localized(6.0));
    }

    #[test]
    fn test_rgv_id_helpers() {
        assert_eq!(RgvId::One.other(), RgvId::Two);
        assert_eq!(RgvId::from_number(2), Some(RgvId::Two));
        assert_eq!(RgvId::from_number(3), None);
        assert_eq!(RgvId::Two.to_string(), "rgv2");
    }
}
