use crate::models::{
    traits::IAgent,
    common::{euler_from_quaternion, Position3D, Velocity3D},
    vehicle_state::VehicleState,
};
use crate::cache::{AttitudeSample, TelemetrySample};
use crate::output::{ControlIntent, Setpoint, VehicleCommand};
use tracing::{debug, trace};

const GRAVITY: f64 = 9.80665;

/// UAS機体モデルのパラメータ
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UasModelParams {
    /// 最大水平速度（m/s）
    pub max_speed: f64,
    /// 最大上昇・降下速度（m/s）
    pub max_vertical_speed: f64,
    /// 速度応答の時定数（秒）
    pub response_time: f64,
    /// ホバリング推力（正規化）
    pub hover_thrust: f64,
}

/// UASの簡易機体モデル
///
/// フライトコントローラ内部の姿勢・角速度ループは理想的に追従するものとし、
/// 位置・速度セットポイントには一次遅れで、姿勢＋推力には傾斜による
/// 加速度と線形抗力で応答します。アームされるまで地上で静止しています。
#[derive(Debug, Clone)]
pub struct UasModel {
    pub state: VehicleState,
    pub params: UasModelParams,
    pub armed: bool,
    pub offboard: bool,
    /// 最後に受信したセットポイント
    command: Option<ControlIntent>,
    /// 飛行時間（秒）
    pub flight_time: f64,
}

impl UasModel {
    pub fn new(start: Position3D, heading: f64, params: UasModelParams) -> Self {
        let mut state = VehicleState::at(start);
        state.heading = heading;
        Self {
            state,
            params,
            armed: false,
            offboard: false,
            command: None,
            flight_time: 0.0,
        }
    }

    /// セットポイントの受信
    pub fn apply_setpoint(&mut self, intent: ControlIntent) {
        self.command = Some(intent);
    }

    /// 機体コマンドの受信
    pub fn handle_command(&mut self, command: VehicleCommand) {
        match command {
            VehicleCommand::SetOffboardMode => self.offboard = true,
            VehicleCommand::Arm => self.armed = true,
            VehicleCommand::Disarm => {
                self.armed = false;
                self.state.velocity = Velocity3D::zero();
            }
        }
        debug!(command = ?command, armed = self.armed, offboard = self.offboard, "UASがコマンドを受信しました");
    }

    /// 現在状態のテレメトリ
    pub fn telemetry(&self, timestamp: f64) -> TelemetrySample {
        TelemetrySample {
            timestamp,
            position: self.state.position,
            velocity: self.state.velocity,
            heading: self.state.heading,
        }
    }

    pub fn attitude(&self, timestamp: f64) -> AttitudeSample {
        AttitudeSample { timestamp, q: self.state.attitude }
    }

    /// 一次遅れで目標速度へ近づける
    fn track_velocity(&mut self, desired: Velocity3D, dt: f64) {
        let alpha = (dt / self.params.response_time).min(1.0);
        let v = self.state.velocity;
        self.state.velocity = v + (desired - v) * alpha;
    }

    fn integrate(&mut self, dt: f64) {
        let v = self.state.velocity;
        let horizontal = Velocity3D::new(v.x, v.y, 0.0).clamp_magnitude(self.params.max_speed);
        let vz = v.z.clamp(-self.params.max_vertical_speed, self.params.max_vertical_speed);
        self.state.velocity = Velocity3D::new(horizontal.x, horizontal.y, vz);
        self.state.position = self.state.position + self.state.velocity.displacement(dt);

        // 地面より下には行かない
        if self.state.position.z > 0.0 {
            self.state.position.z = 0.0;
            self.state.velocity.z = self.state.velocity.z.min(0.0);
        }
    }

    fn step_position(&mut self, target: Position3D, yaw: f64, dt: f64) {
        let error = target - self.state.position;
        let desired = Velocity3D::new(error.x, error.y, error.z) * (1.0 / self.params.response_time);
        let horizontal = Velocity3D::new(desired.x, desired.y, 0.0).clamp_magnitude(self.params.max_speed);
        let vz = desired.z.clamp(-self.params.max_vertical_speed, self.params.max_vertical_speed);
        self.track_velocity(Velocity3D::new(horizontal.x, horizontal.y, vz), dt);
        self.state.heading = yaw;
        self.state.thrust = None;
    }

    fn step_velocity(&mut self, desired: Velocity3D, dt: f64) {
        self.track_velocity(desired, dt);
        if desired.magnitude_xy() > 1e-6 {
            self.state.heading = desired.y.atan2(desired.x);
        }
        self.state.thrust = None;
    }

    /// 姿勢＋推力: 傾斜方向への加速度と線形抗力
    fn step_attitude(&mut self, q: [f64; 4], thrust_body: [f64; 3], dt: f64) {
        let (_, pitch, yaw) = euler_from_quaternion(q);
        let thrust = -thrust_body[2];
        let specific_force = GRAVITY * thrust / self.params.hover_thrust.max(1e-3);
        let tilt = -pitch;

        let drag = 1.0 / self.params.response_time;
        let v = self.state.velocity;
        let forward = specific_force * tilt.sin();
        let ax = forward * yaw.cos() - drag * v.x;
        let ay = forward * yaw.sin() - drag * v.y;
        // NED: 上向きの推力はzの負方向
        let az = GRAVITY - specific_force * tilt.cos() - drag * v.z;

        self.state.velocity = v + Velocity3D::new(ax, ay, az) * dt;
        self.state.heading = yaw;
        self.state.attitude = q;
        self.state.thrust = Some(thrust_body);
    }
}

impl IAgent for UasModel {
    fn tick(&mut self, dt: f64) {
        if !self.armed {
            return;
        }

        match self.command.map(|c| c.setpoint) {
            Some(Setpoint::Position { position, yaw }) => self.step_position(position, yaw, dt),
            Some(Setpoint::Velocity { velocity }) => self.step_velocity(velocity, dt),
            Some(Setpoint::AttitudeThrust(cmd)) => self.step_attitude(cmd.q, cmd.thrust_body, dt),
            None => self.track_velocity(Velocity3D::zero(), dt),
        }
        self.integrate(dt);
        self.flight_time += dt;

        trace!(
            x = self.state.position.x,
            y = self.state.position.y,
            altitude = self.state.altitude(),
            speed = self.state.speed(),
            "UAS状態更新"
        );
    }

    fn get_id(&self) -> String {
        "uas".to_string()
    }

    fn is_active(&self) -> bool {
        self.armed
    }
}
