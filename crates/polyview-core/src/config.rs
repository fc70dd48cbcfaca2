//! 引擎配置
//!
//! 所有可调参数集中在 `EngineConfig` 中，由调用方显式传入；
//! 默认颜色等显示属性也通过这里传递，而不是进程级全局状态。

use crate::error::{GeomError, Result};
use crate::geometry::ShapeStyle;
use crate::proximity::ProximityMode;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// 浮点比较容差
    pub epsilon: f64,
    /// 角度捕捉的方向数（8 即 45° 步长）
    pub snap_directions: usize,
    /// 网格间距
    pub grid_size: f64,
    /// 新建形状的默认样式
    pub default_style: ShapeStyle,
    /// 距离查询模式
    pub proximity_mode: ProximityMode,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            epsilon: crate::math::EPSILON,
            snap_directions: 8,
            grid_size: 1.0,
            default_style: ShapeStyle::default(),
            proximity_mode: ProximityMode::Indexed,
        }
    }
}

impl EngineConfig {
    /// 从 JSON 加载，缺省字段使用默认值
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.epsilon > 0.0) {
            return Err(GeomError::InvalidConfig(format!(
                "epsilon must be positive, got {}",
                self.epsilon
            )));
        }
        if self.snap_directions < 2 {
            return Err(GeomError::InvalidConfig(format!(
                "snap_directions must be at least 2, got {}",
                self.snap_directions
            )));
        }
        if !(self.grid_size > 0.0) {
            return Err(GeomError::InvalidConfig(format!(
                "grid_size must be positive, got {}",
                self.grid_size
            )));
        }
        Ok(())
    }
}
