//! # Scheduler モジュール
//!
//! ミッションフェーズのスケジューラを提供します。
//!
//! 外部の周期タイマーから`tick`が呼ばれるたびに、次の順で処理します。
//!
//! 1. キャッシュの写しからUAS状態を取り出す（古くても待たずに続行）
//! 2. 新しいビジョンフレームを関連付けてトラッカーへ入力し、計時窓を更新
//! 3. 高度エンベロープ監視、探索カーソル更新、フェーズ遷移判定
//! 4. アクティブなフェーズへセットポイント計算を委譲（純粋関数）
//! 5. 制御モード・セットポイント、機体コマンド、目標状態、異常を出力
//!
//! 副作用は2・3（トラッカーとフェーズ状態）と5（外部出力）に限られます。
//! ウェイポイント、カーソル、両トラッカー、シーケンス番号は
//! スケジューラだけが所有します。

use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{info, warn, debug};

use crate::cache::InputSnapshot;
use crate::models::{
    association::{associate, VisionFrame},
    common::distance,
    rgv_track::{RgvId, RgvTracker, TrackerParams},
    traits::IGroundProjector,
    vehicle_state::{VehicleState, Waypoint},
};
use crate::output::{
    ControlIntent, IMissionOutput, OffboardControlMode, OutputFrame, TargetStateBroadcast, VehicleCommand,
};
use crate::phases::{GuidanceParams, MissionPhase, PhaseContext};
use crate::scenario::ConfigError;

/// 監視者へ通知する安全異常
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SafetyFault {
    #[error("高度が許容範囲外です: {altitude:.2}m (許容範囲 {min:.2}〜{max:.2}m)")]
    AltitudeOutOfBounds { altitude: f64, min: f64, max: f64 },
}

/// スケジューラのパラメータ
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchedulerParams {
    /// ウェイポイント到達半径（m）
    pub arrival_radius: f64,
    /// 高度エンベロープ（m）
    pub min_height: f64,
    pub max_height: f64,
    /// これより古いテレメトリは古いと報告（秒）
    pub telemetry_max_age: f64,
    /// 新しいフレームが届かない間、これより長く検出がないRGVはフレーム外（秒）
    pub vision_max_age: f64,
    /// 未同定ブロブの関連付けゲート半径（m）
    pub association_gate_radius: f64,
    /// 粗位置特定フェーズの最大滞在時間（秒）
    pub coarse_dwell_timeout: f64,
    /// 滞在時間超過後、同じRGVを再捕捉しない時間（秒）
    pub reacquire_cooldown: f64,
    /// オフボード切替前に送出するセットポイント数
    pub offboard_warmup_ticks: u32,
    pub tracker: TrackerParams,
    pub guidance: GuidanceParams,
}

/// 1ティックの処理結果
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub sequence: u64,
    pub phase: MissionPhase,
    /// テレメトリ未受信のティックではNone
    pub intent: Option<ControlIntent>,
    /// このティックで発生した遷移（遷移前, 遷移後）
    pub transitions: Vec<(MissionPhase, MissionPhase)>,
    pub faults: Vec<SafetyFault>,
    pub stale_telemetry: bool,
}

/// ミッションスケジューラ
pub struct MissionScheduler {
    params: SchedulerParams,
    waypoints: Vec<Waypoint>,
    cursor: usize,
    trackers: [RgvTracker; 2],
    cameras: Vec<Box<dyn IGroundProjector + Send + Sync>>,
    phase: MissionPhase,
    primary: RgvId,
    phase_entered_at: f64,
    cooldown_until: [Option<f64>; 2],
    last_frame_time: BTreeMap<usize, f64>,
    sequence: u64,
    setpoints_sent: u32,
    offboard_engaged: bool,
    envelope_armed: bool,
    telemetry_stale: bool,
    finished: bool,
}

impl MissionScheduler {
    /// スケジューラの生成
    ///
    /// ウェイポイントが空の場合は開始できないため`ConfigError`を返します。
    pub fn new(
        params: SchedulerParams,
        waypoints: Vec<Waypoint>,
        cameras: Vec<Box<dyn IGroundProjector + Send + Sync>>,
    ) -> Result<Self, ConfigError> {
        if waypoints.is_empty() {
            return Err(ConfigError::Validation("ウェイポイントが1つもありません".to_string()));
        }
        if params.min_height >= params.max_height {
            return Err(ConfigError::Validation(format!(
                "min_height ({}) は max_height ({}) より小さくなければなりません",
                params.min_height, params.max_height
            )));
        }

        Ok(Self {
            params,
            waypoints,
            cursor: 0,
            trackers: [
                RgvTracker::new(RgvId::One, params.tracker),
                RgvTracker::new(RgvId::Two, params.tracker),
            ],
            cameras,
            phase: MissionPhase::Exploration,
            primary: RgvId::One,
            phase_entered_at: 0.0,
            cooldown_until: [None, None],
            last_frame_time: BTreeMap::new(),
            sequence: 0,
            setpoints_sent: 0,
            offboard_engaged: false,
            envelope_armed: false,
            telemetry_stale: false,
            finished: false,
        })
    }

    /// 1ティックの実行
    pub fn tick(&mut self, now: f64, snapshot: &InputSnapshot, out: &mut dyn IMissionOutput) -> TickReport {
        self.sequence += 1;
        let mut report = TickReport {
            sequence: self.sequence,
            phase: self.phase,
            intent: None,
            transitions: Vec::new(),
            faults: Vec::new(),
            stale_telemetry: false,
        };

        let uas = snapshot.uas;
        report.stale_telemetry = self.check_telemetry_age(now, snapshot);

        self.ingest_vision(now, uas.as_ref(), &snapshot.frames);

        let Some(uas) = uas else {
            // テレメトリ未受信では制御意図を計算できない
            self.broadcast_targets(now, out);
            return report;
        };

        if let Some(fault) = self.check_altitude(&uas) {
            warn!(sequence = self.sequence, time = now, altitude = uas.altitude(), "ALTITUDE_FAULT: 高度エンベロープを逸脱しています");
            out.report_fault(self.sequence, &fault);
            report.faults.push(fault);
        }

        if self.phase == MissionPhase::Exploration {
            self.advance_cursor_on_arrival(&uas);
        }

        report.transitions = self.evaluate_transitions(now);
        if let Some(transition) = self.apply_dwell_timeout(now) {
            report.transitions.push(transition);
        }
        report.phase = self.phase;

        let ctx = PhaseContext {
            now,
            uas: &uas,
            trackers: &self.trackers,
            primary: self.primary,
            waypoint: &self.waypoints[self.cursor],
            guidance: &self.params.guidance,
        };
        let intent = self.phase.compute_setpoint(&ctx);
        report.intent = Some(intent);

        out.publish_control(&OutputFrame {
            sequence: self.sequence,
            timestamp: now,
            phase: self.phase,
            control_mode: OffboardControlMode::from(intent.mode()),
            intent,
        });
        self.setpoints_sent = self.setpoints_sent.saturating_add(1);

        // オフボード切替はセットポイントを一定数送出した後に一度だけ
        if !self.offboard_engaged && self.setpoints_sent >= self.params.offboard_warmup_ticks {
            out.publish_vehicle_command(self.sequence, VehicleCommand::SetOffboardMode);
            out.publish_vehicle_command(self.sequence, VehicleCommand::Arm);
            self.offboard_engaged = true;
            info!(sequence = self.sequence, time = now, "OFFBOARD_ENGAGED: オフボードモードへ切り替えアームしました");
        }

        self.broadcast_targets(now, out);
        report
    }

    /// ミッション終了（ディスアームを一度だけ送出）
    pub fn finish(&mut self, now: f64, out: &mut dyn IMissionOutput) {
        if self.finished {
            return;
        }
        self.finished = true;
        if self.offboard_engaged {
            self.sequence += 1;
            out.publish_vehicle_command(self.sequence, VehicleCommand::Disarm);
            info!(sequence = self.sequence, time = now, phase = %self.phase, "MISSION_END: ディスアームしました");
        }
    }

    fn check_telemetry_age(&mut self, now: f64, snapshot: &InputSnapshot) -> bool {
        let stale = snapshot
            .telemetry_age(now)
            .is_none_or(|age| age > self.params.telemetry_max_age);

        if stale && !self.telemetry_stale {
            warn!(
                sequence = self.sequence,
                time = now,
                age = ?snapshot.telemetry_age(now),
                "TELEMETRY_STALE: テレメトリが更新されていません。最後の値で継続します"
            );
        } else if !stale && self.telemetry_stale {
            info!(sequence = self.sequence, time = now, "TELEMETRY_RESUMED: テレメトリが復帰しました");
        }
        self.telemetry_stale = stale;
        stale
    }

    /// 新しいフレームの関連付けとトラッカー更新
    ///
    /// 新しいフレームが届いたティックでは、検出のないRGVを直ちにフレーム外と
    /// します。フレームが届かないティックでは最後の検出から`vision_max_age`
    /// を超えた時点でフレーム外とします。
    fn ingest_vision(&mut self, now: f64, uas: Option<&VehicleState>, frames: &[VisionFrame]) {
        let fresh: Vec<VisionFrame> = frames
            .iter()
            .filter(|f| self.last_frame_time.get(&f.camera_id).is_none_or(|t| f.timestamp > *t))
            .filter(|f| now - f.timestamp <= self.params.vision_max_age)
            .cloned()
            .collect();
        for frame in &fresh {
            self.last_frame_time.insert(frame.camera_id, frame.timestamp);
        }

        // 逆投影にはUAS状態が必要
        let observed = uas.is_some() && !fresh.is_empty();
        let detections = match uas {
            Some(uas) if observed => associate(
                &fresh,
                uas,
                &self.cameras,
                &self.trackers,
                self.params.association_gate_radius,
            ),
            _ => [None, None],
        };

        for (tracker, detection) in self.trackers.iter_mut().zip(detections) {
            match detection {
                Some(det) => tracker.update_from_detection(det.position, det.timestamp),
                None if observed => tracker.mark_out_of_frame(),
                None => {
                    let expired = tracker
                        .last_detection_time()
                        .is_none_or(|t| now - t > self.params.vision_max_age);
                    if expired {
                        tracker.mark_out_of_frame();
                    }
                }
            }
        }

        let both_in_frame = self.are_rgvs_in_frame();
        for tracker in self.trackers.iter_mut() {
            tracker.refresh_localization(now, both_in_frame);
        }
    }

    /// 高度エンベロープの監視
    ///
    /// 初めてエンベロープ内に入った時点で監視を開始し、以降は逸脱している
    /// ティックごとに異常を返します。値のクランプは行いません。
    fn check_altitude(&mut self, uas: &VehicleState) -> Option<SafetyFault> {
        let altitude = uas.altitude();
        let (min, max) = (self.params.min_height, self.params.max_height);
        let inside = altitude >= min && altitude <= max;

        if !self.envelope_armed {
            if inside {
                self.envelope_armed = true;
                debug!(altitude, "高度エンベロープの監視を開始しました");
            }
            return None;
        }

        (!inside).then_some(SafetyFault::AltitudeOutOfBounds { altitude, min, max })
    }

    /// 到達判定とカーソル更新（1ティックに最大1つ）
    fn advance_cursor_on_arrival(&mut self, uas: &VehicleState) {
        let waypoint = &self.waypoints[self.cursor];
        let d = distance(uas, &waypoint.state);
        if d < self.params.arrival_radius {
            info!(
                waypoint = waypoint.index,
                distance = d,
                "WAYPOINT_REACHED: ウェイポイントに到達しました"
            );
            self.advance_cursor();
        }
    }

    fn advance_cursor(&mut self) {
        // 最後のウェイポイントの次は先頭に戻って探索を続ける
        self.cursor = (self.cursor + 1) % self.waypoints.len();
    }

    /// フェーズ遷移の判定（固定順序、満たされない条件で停止）
    fn evaluate_transitions(&mut self, now: f64) -> Vec<(MissionPhase, MissionPhase)> {
        let mut transitions = Vec::new();
        loop {
            let next = match self.phase {
                MissionPhase::Exploration => self.select_primary(now).map(|id| {
                    self.primary = id;
                    MissionPhase::CoarseLocalization
                }),
                MissionPhase::CoarseLocalization => self
                    .tracker(self.primary)
                    .is_coarse_localized(now)
                    .then_some(MissionPhase::Trailing),
                MissionPhase::Trailing => self
                    .tracker(self.primary.other())
                    .in_frame()
                    .then_some(MissionPhase::JointExploration),
                MissionPhase::JointExploration => self
                    .trackers
                    .iter()
                    .all(|t| t.is_coarse_localized(now) && t.is_joint_localized(now))
                    .then_some(MissionPhase::JointTrailing),
                MissionPhase::JointTrailing => None,
            };

            let Some(next) = next else {
                break;
            };
            transitions.push((self.phase, next));
            self.enter_phase(next, now);
        }
        transitions
    }

    /// 探索中に捕捉するRGV（番号の小さい順、再捕捉待ちは除外）
    fn select_primary(&self, now: f64) -> Option<RgvId> {
        RgvId::ALL.into_iter().find(|id| {
            self.tracker(*id).in_frame()
                && self.cooldown_until[id.index()].is_none_or(|until| now >= until)
        })
    }

    fn enter_phase(&mut self, next: MissionPhase, now: f64) {
        info!(
            time = now,
            from = %self.phase,
            to = %next,
            primary = %self.primary,
            "PHASE_TRANSITION: フェーズが遷移しました"
        );
        self.phase = next;
        self.phase_entered_at = now;
    }

    /// 粗位置特定の滞在時間超過による探索への復帰
    fn apply_dwell_timeout(&mut self, now: f64) -> Option<(MissionPhase, MissionPhase)> {
        if self.phase != MissionPhase::CoarseLocalization
            || now - self.phase_entered_at < self.params.coarse_dwell_timeout
            || self.tracker(self.primary).is_coarse_localized(now)
        {
            return None;
        }

        let until = now + self.params.reacquire_cooldown;
        self.cooldown_until[self.primary.index()] = Some(until);
        warn!(
            time = now,
            rgv = %self.primary,
            dwell = now - self.phase_entered_at,
            cooldown_until = until,
            "DWELL_TIMEOUT: 粗位置特定が時間内に完了しないため探索へ戻ります"
        );
        self.enter_phase(MissionPhase::Exploration, now);
        self.advance_cursor();
        Some((MissionPhase::CoarseLocalization, MissionPhase::Exploration))
    }

    fn broadcast_targets(&self, now: f64, out: &mut dyn IMissionOutput) {
        for tracker in &self.trackers {
            out.publish_target_state(&TargetStateBroadcast {
                sequence: self.sequence,
                rgv: tracker.id,
                status: tracker.status(now),
                in_frame: tracker.in_frame(),
                stopped: tracker.is_stopped(now),
                state: *tracker.estimate(),
            });
        }
    }

    /// 両RGVが同時にフレーム内にあるか
    pub fn are_rgvs_in_frame(&self) -> bool {
        self.trackers.iter().all(|t| t.in_frame())
    }

    pub fn phase(&self) -> MissionPhase {
        self.phase
    }

    pub fn primary(&self) -> RgvId {
        self.primary
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn tracker(&self, id: RgvId) -> &RgvTracker {
        &self.trackers[id.index()]
    }

    pub fn is_offboard_engaged(&self) -> bool {
        self.offboard_engaged
    }
}
