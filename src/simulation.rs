//! # Simulation モジュール
//!
//! ミッションスケジューラを閉ループで飛行させるシミュレーションエンジンを
//! 提供します。
//!
//! スケジューラの外部協調者（テレメトリ、ビジョン前段、フライト
//! コントローラ）を真値モデルで置き換え、ミッションファイルを端から端まで
//! 実行できるようにします。
//!
//! ## シミュレーション処理順序
//!
//! 各ティックにおいて、以下の順序で処理が実行されます：
//!
//! 1. **入力書き込み**: UASのテレメトリ・姿勢とカメラごとの合成ブロブをキャッシュへ
//! 2. **スケジューラ**: キャッシュの写しで1ティック実行
//! 3. **出力適用**: セットポイントと機体コマンドをUASモデルへ
//! 4. **真値更新**: UASとRGVの運動を積分
//!
//! 高速実行（`run`）はティックを待たずに進め、実時間実行（`run_paced`）は
//! tokioのインターバルでティック周期に合わせます。

use std::time::Duration;
use tracing::{info, warn, debug, trace};

use crate::cache::InputCache;
use crate::models::{
    association::{Blob, VisionFrame},
    camera::NadirCamera,
    common::{math_utils, Velocity3D},
    ground_target::{GroundTarget, Leg},
    rgv_track::{RgvId, TrackStatus},
    traits::{IAgent, IGroundProjector},
    uas_model::{UasModel, UasModelParams},
};
use crate::output::{FanOut, IMissionOutput, RecordingOutput, TracingOutput};
use crate::phases::MissionPhase;
use crate::scenario::{ConfigError, MissionConfig};
use crate::scheduler::{MissionScheduler, TickReport};

/// 合成ブロブの面積（画素）
const SYNTHETIC_BLOB_AREA: f64 = 60.0;

/// 実行結果の概要
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationSummary {
    pub final_phase: MissionPhase,
    pub ticks: u64,
    pub elapsed: f64,
    /// フェーズ遷移の履歴（時刻, 遷移前, 遷移後）
    pub transitions: Vec<(f64, MissionPhase, MissionPhase)>,
    pub fault_count: usize,
    pub stale_ticks: usize,
    pub rgv_status: [TrackStatus; 2],
    pub final_cursor: usize,
}

impl SimulationSummary {
    /// 指定フェーズへ最初に入った時刻
    pub fn time_entered(&self, phase: MissionPhase) -> Option<f64> {
        self.transitions.iter().find(|(_, _, to)| *to == phase).map(|(t, _, _)| *t)
    }

    pub fn print(&self) {
        println!("=== 実行結果 ===");
        println!("最終フェーズ: {}", self.final_phase);
        println!("実行時間: {:.1}秒 ({}ティック)", self.elapsed, self.ticks);
        println!("フェーズ遷移:");
        for (t, from, to) in &self.transitions {
            println!("  {:>7.2}秒: {} -> {}", t, from, to);
        }
        for id in RgvId::ALL {
            println!("{}: {:?}", id, self.rgv_status[id.index()]);
        }
        println!("安全異常: {}件", self.fault_count);
        println!("テレメトリ遅延ティック: {}", self.stale_ticks);
        println!("探索カーソル: {}", self.final_cursor);
    }
}

pub struct SimulationEngine {
    pub current_time: f64,
    pub dt: f64,
    pub max_time: f64,
    pub step_count: u64,

    pub uas: UasModel,
    pub rgvs: Vec<GroundTarget>,
    cameras: Vec<NadirCamera>,
    cache: InputCache,
    scheduler: MissionScheduler,

    transitions: Vec<(f64, MissionPhase, MissionPhase)>,
    fault_count: usize,
    stale_ticks: usize,
    pub verbose_level: u8,
}

impl SimulationEngine {
    pub fn new(config: &MissionConfig, verbose_level: u8) -> Result<Self, ConfigError> {
        let scheduler = MissionScheduler::new(
            config.scheduler_params(),
            config.mission_waypoints(),
            config.ground_projectors(),
        )?;

        let uas = UasModel::new(
            config.uas.start.to_position(),
            math_utils::deg_to_rad(config.uas.heading_deg),
            UasModelParams {
                max_speed: config.uas.max_speed_mps,
                max_vertical_speed: config.uas.max_vertical_speed_mps,
                response_time: config.uas.response_time_s,
                hover_thrust: config.guidance.hover_thrust,
            },
        );

        let mut rgvs = Vec::with_capacity(config.rgvs.len());
        for rgv in &config.rgvs {
            let id = RgvId::from_number(rgv.id)
                .ok_or_else(|| ConfigError::Validation(format!("RGV id must be 1 or 2 (got {})", rgv.id)))?;
            let legs = rgv
                .legs
                .iter()
                .map(|l| Leg { velocity: Velocity3D::new(l.vx_mps, l.vy_mps, 0.0), duration: l.duration_s })
                .collect();
            rgvs.push(GroundTarget::new(id, rgv.start.to_position(), legs));
        }

        Ok(Self {
            current_time: 0.0,
            dt: config.sim.tick_period_s,
            max_time: config.sim.duration_s,
            step_count: 0,
            uas,
            rgvs,
            cameras: config.nadir_cameras(),
            cache: InputCache::new(),
            scheduler,
            transitions: Vec::new(),
            fault_count: 0,
            stale_ticks: 0,
            verbose_level,
        })
    }

    /// 高速実行
    pub fn run(&mut self) -> SimulationSummary {
        info!("=== シミュレーション実行開始 ===");
        while self.current_time < self.max_time {
            self.step();
            self.report_progress();
        }
        self.finish()
    }

    /// 実時間実行（ティック周期ごとに1ステップ）
    pub async fn run_paced(&mut self) -> SimulationSummary {
        info!(period = self.dt, "=== シミュレーション実行開始（実時間） ===");
        let mut interval = tokio::time::interval(Duration::from_secs_f64(self.dt));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        while self.current_time < self.max_time {
            interval.tick().await;
            self.step();
            self.report_progress();
        }
        self.finish()
    }

    fn report_progress(&self) {
        if self.verbose_level > 2 {
            trace!("時刻: {:.2}秒 (ステップ: {})", self.current_time, self.step_count);
        }
        if self.step_count % 100 == 0 && self.verbose_level > 0 {
            let progress = (self.current_time / self.max_time) * 100.0;
            info!(
                "進行状況: {:.1}% ({:.1}/{:.1}秒) フェーズ: {}",
                progress,
                self.current_time,
                self.max_time,
                self.scheduler.phase()
            );
        }
    }

    /// 1ティック分の処理
    pub fn step(&mut self) -> TickReport {
        // 時刻は刻み数から求めて累積誤差を避ける
        let now = self.step_count as f64 * self.dt;
        self.current_time = now;

        self.publish_inputs(now);

        let snapshot = self.cache.snapshot();
        let mut log = TracingOutput;
        let mut recorder = RecordingOutput::default();
        let report = {
            let mut out = FanOut { sinks: vec![&mut log as &mut dyn IMissionOutput, &mut recorder] };
            self.scheduler.tick(now, &snapshot, &mut out)
        };

        for frame in &recorder.frames {
            self.uas.apply_setpoint(frame.intent);
        }
        for (_, command) in &recorder.commands {
            self.uas.handle_command(*command);
        }
        for (t_from, t_to) in &report.transitions {
            self.transitions.push((now, *t_from, *t_to));
        }
        self.fault_count += report.faults.len();
        if report.stale_telemetry {
            self.stale_ticks += 1;
        }

        advance_agent(&mut self.uas, self.dt);
        for rgv in &mut self.rgvs {
            advance_agent(rgv, self.dt);
        }

        self.step_count += 1;
        self.current_time = self.step_count as f64 * self.dt;
        report
    }

    /// UASテレメトリと合成ビジョンフレームをキャッシュへ書き込む
    fn publish_inputs(&self, now: f64) {
        if let Err(e) = self.cache.update_telemetry(self.uas.telemetry(now)) {
            warn!(error = %e, "テレメトリを書き込めませんでした");
        }
        if let Err(e) = self.cache.update_attitude(self.uas.attitude(now)) {
            warn!(error = %e, "姿勢を書き込めませんでした");
        }

        for camera in &self.cameras {
            let blobs: Vec<Blob> = self
                .rgvs
                .iter()
                .filter_map(|rgv| {
                    camera.ground_to_pixel(&self.uas.state, &rgv.position).map(|(u, v)| Blob {
                        u,
                        v,
                        area: SYNTHETIC_BLOB_AREA,
                        rgv: Some(rgv.id),
                    })
                })
                .collect();
            if !blobs.is_empty() {
                debug!(camera_id = camera.id, count = blobs.len(), time = now, "ブロブを合成しました");
            }
            let frame = VisionFrame { camera_id: camera.id, timestamp: now, blobs };
            if let Err(e) = self.cache.update_vision(frame) {
                warn!(error = %e, camera_id = camera.id, "ビジョンフレームを書き込めませんでした");
            }
        }
    }

    fn finish(&mut self) -> SimulationSummary {
        let mut log = TracingOutput;
        let mut recorder = RecordingOutput::default();
        {
            let mut out = FanOut { sinks: vec![&mut log as &mut dyn IMissionOutput, &mut recorder] };
            self.scheduler.finish(self.current_time, &mut out);
        }
        for (_, command) in &recorder.commands {
            self.uas.handle_command(*command);
        }

        info!("=== シミュレーション完了 ===");
        info!("実行時間: {:.1}秒", self.current_time);
        info!("総ステップ数: {}", self.step_count);

        self.summary()
    }

    pub fn summary(&self) -> SimulationSummary {
        SimulationSummary {
            final_phase: self.scheduler.phase(),
            ticks: self.step_count,
            elapsed: self.current_time,
            transitions: self.transitions.clone(),
            fault_count: self.fault_count,
            stale_ticks: self.stale_ticks,
            rgv_status: RgvId::ALL.map(|id| self.scheduler.tracker(id).status(self.current_time)),
            final_cursor: self.scheduler.cursor(),
        }
    }

    pub fn scheduler(&self) -> &MissionScheduler {
        &self.scheduler
    }
}

/// 真値エージェントを1ティック進める（非アクティブなものは積分しない）
fn advance_agent(agent: &mut dyn IAgent, dt: f64) {
    if !agent.is_active() {
        return;
    }
    agent.tick(dt);
    if !agent.is_active() {
        debug!(agent = %agent.get_id(), "エージェントが非アクティブになりました");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn mission(rgvs: &str, extra: &str) -> MissionConfig {
        let yaml = format!(
            r#"
meta:
  version: "1.0"
  name: sim-test
sim:
  tick_period_s: 0.1
  duration_s: 40.0
thresholds:
  stop_velocity_mps: 0.2
  stop_time_s: 2.0
  coarse_localization_time_s: 3.0
  fine_localization_time_s: 4.0
  localization_window_radius_m: 1.5
  arrival_radius_m: 1.0
  min_height_m: 2.0
  max_height_m: 40.0
offboard:
  warmup_ticks: 5
guidance:
  coarse_altitude_m: 12.0
  trailing_altitude_m: 12.0
  joint_altitude_m: 15.0
waypoints:
  - {{ x_m: 0.0, y_m: 0.0, z_m: -12.0 }}
  - {{ x_m: 15.0, y_m: 0.0, z_m: -12.0 }}
  - {{ x_m: 15.0, y_m: 15.0, z_m: -12.0 }}
cameras:
  - {{ id: 0, fx_px: 300.0, fy_px: 300.0, width_px: 640.0, height_px: 480.0 }}
uas:
  start: {{ x_m: 0.0, y_m: 0.0, z_m: 0.0 }}
  max_speed_mps: 4.0
  max_vertical_speed_mps: 2.0
  response_time_s: 0.5
{rgvs}
{extra}
"#
        );
        MissionConfig::from_yaml_str(&yaml, Path::new(".")).unwrap()
    }

    #[test]
    fn test_without_rgvs_stays_in_exploration() {
        let config = mission("rgvs: []", "");
        let mut engine = SimulationEngine::new(&config, 0).unwrap();
        let summary = engine.run();

        assert_eq!(summary.final_phase, MissionPhase::Exploration);
        assert!(summary.transitions.is_empty());
        assert_eq!(summary.ticks, 400);
        assert_eq!(summary.rgv_status, [TrackStatus::Unseen, TrackStatus::Unseen]);
        assert!(!engine.uas.armed);
    }

    #[test]
    fn test_offboard_engagement_lifts_the_uas() {
        let config = mission("rgvs: []", "");
        let mut engine = SimulationEngine::new(&config, 0).unwrap();
        for _ in 0..100 {
            engine.step();
        }
        assert!(engine.uas.armed);
        assert!(engine.uas.state.altitude() > 5.0);
        assert!(engine.scheduler().is_offboard_engaged());
    }

    #[test]
    fn test_rgv_stops_after_last_leg() {
        let config = mission(
            "rgvs:\n  - { id: 2, start: { x_m: 30.0, y_m: 0.0 }, legs: [ { vx_mps: 1.0, vy_mps: 0.0, duration_s: 2.0 } ] }",
            "",
        );
        let mut engine = SimulationEngine::new(&config, 0).unwrap();
        for _ in 0..50 {
            engine.step();
        }
        let rgv = &engine.rgvs[0];
        assert!(!rgv.is_active());
        assert!((rgv.position.x - 32.0).abs() < 1e-9);
        assert_eq!(rgv.velocity, Velocity3D::zero());
    }

    #[test]
    fn test_stationary_rgv_below_route_is_trailed() {
        let config = mission(
            "rgvs:\n  - { id: 1, start: { x_m: 1.0, y_m: 1.0 } }",
            "",
        );
        let mut engine = SimulationEngine::new(&config, 0).unwrap();
        let summary = engine.run();

        let coarse = summary.time_entered(MissionPhase::CoarseLocalization).unwrap();
        let trailing = summary.time_entered(MissionPhase::Trailing).unwrap();
        assert!(trailing >= coarse + 3.0 - 1e-9);
        assert!(summary.final_phase >= MissionPhase::Trailing);
        assert_eq!(summary.rgv_status[0], TrackStatus::CoarseLocalized);
        for pair in summary.transitions.windows(2) {
            assert!(pair[0].2 <= pair[1].2);
        }
    }
}
