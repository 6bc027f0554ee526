//! # Output モジュール
//!
//! スケジューラから外部（通信トランスポート）への出力境界を提供します。
//!
//! 出力はすべて型付きの抽象メッセージで、ビット単位の形式はトランスポート側の
//! 責務です。ティックごとのシーケンス番号はスケジューラが所有し、
//! 各出力呼び出しに明示的に渡されます。
//!
//! - **制御モード**: 位置・速度・姿勢＋推力のうちどれが有効か（排他）
//! - **セットポイント**: 選択されたモードに対応する指令値
//! - **機体コマンド**: アーム/ディスアーム、オフボードモード切替（開始・終了時のみ）
//! - **目標状態配信**: 各RGVの推定状態（ログ・可視化用）
//! - **安全異常**: 監視者へ通知する異常

use crate::models::{
    common::{AttitudeThrust, Position3D, Velocity3D},
    rgv_track::{RgvId, TrackStatus},
    vehicle_state::VehicleState,
};
use crate::phases::MissionPhase;
use crate::scheduler::SafetyFault;
use tracing::{info, debug, warn};

/// 有効なセットポイントの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMode {
    Position,
    Velocity,
    AttitudeThrust,
}

/// セットポイント
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Setpoint {
    /// 位置（m）とヨー（rad）
    Position { position: Position3D, yaw: f64 },
    /// 速度（m/s）
    Velocity { velocity: Velocity3D },
    /// 姿勢クォータニオンと機体推力
    AttitudeThrust(AttitudeThrust),
}

/// スケジューラの出力する制御意図
///
/// 制御モードはセットポイントの種類から導出するため、両者が食い違うことは
/// ありません。毎ティック新しく生成され、識別子を持ちません。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlIntent {
    pub setpoint: Setpoint,
}

impl ControlIntent {
    pub fn new(setpoint: Setpoint) -> Self {
        Self { setpoint }
    }

    pub fn mode(&self) -> ControlMode {
        match self.setpoint {
            Setpoint::Position { .. } => ControlMode::Position,
            Setpoint::Velocity { .. } => ControlMode::Velocity,
            Setpoint::AttitudeThrust(_) => ControlMode::AttitudeThrust,
        }
    }
}

/// オフボード制御モードのフラグ（排他）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OffboardControlMode {
    pub position: bool,
    pub velocity: bool,
    pub acceleration: bool,
    pub attitude: bool,
    pub body_rate: bool,
}

impl From<ControlMode> for OffboardControlMode {
    fn from(mode: ControlMode) -> Self {
        let mut flags = Self::default();
        match mode {
            ControlMode::Position => flags.position = true,
            ControlMode::Velocity => flags.velocity = true,
            ControlMode::AttitudeThrust => flags.attitude = true,
        }
        flags
    }
}

/// 機体コマンド
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VehicleCommand {
    Arm,
    Disarm,
    SetOffboardMode,
}

impl VehicleCommand {
    const VEHICLE_CMD_DO_SET_MODE: u16 = 176;
    const VEHICLE_CMD_COMPONENT_ARM_DISARM: u16 = 400;

    /// (コマンドID, param1, param2)
    pub fn encode(self) -> (u16, f32, f32) {
        match self {
            VehicleCommand::Arm => (Self::VEHICLE_CMD_COMPONENT_ARM_DISARM, 1.0, 0.0),
            VehicleCommand::Disarm => (Self::VEHICLE_CMD_COMPONENT_ARM_DISARM, 0.0, 0.0),
            VehicleCommand::SetOffboardMode => (Self::VEHICLE_CMD_DO_SET_MODE, 1.0, 6.0),
        }
    }
}

/// 1ティック分の制御出力
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutputFrame {
    /// スケジューラ所有のシーケンス番号（1始まり）
    pub sequence: u64,
    /// ミッション時刻（秒）
    pub timestamp: f64,
    pub phase: MissionPhase,
    pub control_mode: OffboardControlMode,
    pub intent: ControlIntent,
}

/// RGV推定状態の配信メッセージ
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetStateBroadcast {
    pub sequence: u64,
    pub rgv: RgvId,
    pub status: TrackStatus,
    pub in_frame: bool,
    pub stopped: bool,
    pub state: VehicleState,
}

/// 外部出力のインターフェース
pub trait IMissionOutput {
    /// 制御モードとセットポイントの出力
    fn publish_control(&mut self, frame: &OutputFrame);

    /// 機体コマンドの出力
    fn publish_vehicle_command(&mut self, sequence: u64, command: VehicleCommand);

    /// RGV推定状態の配信
    fn publish_target_state(&mut self, broadcast: &TargetStateBroadcast);

    /// 安全異常の通知
    fn report_fault(&mut self, sequence: u64, fault: &SafetyFault);
}

/// すべての出力をtracingイベントとして記録する実装
#[derive(Debug, Default)]
pub struct TracingOutput;

impl IMissionOutput for TracingOutput {
    fn publish_control(&mut self, frame: &OutputFrame) {
        match frame.intent.setpoint {
            Setpoint::Position { position, yaw } => debug!(
                sequence = frame.sequence,
                phase = %frame.phase,
                x = position.x,
                y = position.y,
                z = position.z,
                yaw,
                "SETPOINT: 位置指令"
            ),
            Setpoint::Velocity { velocity } => debug!(
                sequence = frame.sequence,
                phase = %frame.phase,
                vx = velocity.x,
                vy = velocity.y,
                vz = velocity.z,
                "SETPOINT: 速度指令"
            ),
            Setpoint::AttitudeThrust(cmd) => debug!(
                sequence = frame.sequence,
                phase = %frame.phase,
                q0 = cmd.q[0],
                q1 = cmd.q[1],
                q2 = cmd.q[2],
                q3 = cmd.q[3],
                thrust_z = cmd.thrust_body[2],
                "SETPOINT: 姿勢・推力指令"
            ),
        }
    }

    fn publish_vehicle_command(&mut self, sequence: u64, command: VehicleCommand) {
        let (id, param1, param2) = command.encode();
        info!(sequence, command = ?command, id, param1, param2, "VEHICLE_COMMAND: 機体コマンドを送信しました");
    }

    fn publish_target_state(&mut self, broadcast: &TargetStateBroadcast) {
        debug!(
            sequence = broadcast.sequence,
            rgv = %broadcast.rgv,
            status = ?broadcast.status,
            in_frame = broadcast.in_frame,
            stopped = broadcast.stopped,
            x = broadcast.state.position.x,
            y = broadcast.state.position.y,
            vx = broadcast.state.velocity.x,
            vy = broadcast.state.velocity.y,
            "TARGET_STATE: RGV推定状態"
        );
    }

    fn report_fault(&mut self, sequence: u64, fault: &SafetyFault) {
        warn!(sequence, fault = %fault, "SAFETY_FAULT: 安全異常を検出しました");
    }
}

/// 出力をメモリ上に保持する実装（シミュレーションと検証用）
#[derive(Debug, Default)]
pub struct RecordingOutput {
    pub frames: Vec<OutputFrame>,
    pub commands: Vec<(u64, VehicleCommand)>,
    pub broadcasts: Vec<TargetStateBroadcast>,
    pub faults: Vec<(u64, SafetyFault)>,
}

impl RecordingOutput {
    pub fn last_frame(&self) -> Option<&OutputFrame> {
        self.frames.last()
    }

    /// 直近のRGV推定状態
    pub fn latest_broadcast(&self, rgv: RgvId) -> Option<&TargetStateBroadcast> {
        self.broadcasts.iter().rev().find(|b| b.rgv == rgv)
    }
}

impl IMissionOutput for RecordingOutput {
    fn publish_control(&mut self, frame: &OutputFrame) {
        self.frames.push(*frame);
    }

    fn publish_vehicle_command(&mut self, sequence: u64, command: VehicleCommand) {
        self.commands.push((sequence, command));
    }

    fn publish_target_state(&mut self, broadcast: &TargetStateBroadcast) {
        self.broadcasts.push(*broadcast);
    }

    fn report_fault(&mut self, sequence: u64, fault: &SafetyFault) {
        self.faults.push((sequence, fault.clone()));
    }
}

/// 複数の出力先へ同じ内容を送る
pub struct FanOut<'a> {
    pub sinks: Vec<&'a mut dyn IMissionOutput>,
}

impl IMissionOutput for FanOut<'_> {
    fn publish_control(&mut self, frame: &OutputFrame) {
        for sink in self.sinks.iter_mut() {
            sink.publish_control(frame);
        }
    }

    fn publish_vehicle_command(&mut self, sequence: u64, command: VehicleCommand) {
        for sink in self.sinks.iter_mut() {
            sink.publish_vehicle_command(sequence, command);
        }
    }

    fn publish_target_state(&mut self, broadcast: &TargetStateBroadcast) {
        for sink in self.sinks.iter_mut() {
            sink.publish_target_state(broadcast);
        }
    }

    fn report_fault(&mut self, sequence: u64, fault: &SafetyFault) {
        for sink in self.sinks.iter_mut() {
            sink.report_fault(sequence, fault);
        }
    }
}
