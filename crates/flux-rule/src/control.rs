use crate::error::ControlError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

/// 控制存储中的值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ControlValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl ControlValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            ControlValue::Bool(_) => "bool",
            ControlValue::Int(_) => "int",
            ControlValue::Float(_) => "float",
            ControlValue::Text(_) => "text",
        }
    }

    /// 按布尔值读取，类型不符时返回错误
    pub fn as_bool(&self, name: &str) -> Result<bool, ControlError> {
        match self {
            ControlValue::Bool(b) => Ok(*b),
            other => Err(ControlError::TypeMismatch {
                name: name.to_string(),
                found: other.type_name(),
            }),
        }
    }
}

impl From<bool> for ControlValue {
    fn from(v: bool) -> Self {
        ControlValue::Bool(v)
    }
}

impl From<i64> for ControlValue {
    fn from(v: i64) -> Self {
        ControlValue::Int(v)
    }
}

impl From<f64> for ControlValue {
    fn from(v: f64) -> Self {
        ControlValue::Float(v)
    }
}

impl From<&str> for ControlValue {
    fn from(v: &str) -> Self {
        ControlValue::Text(v.to_string())
    }
}

impl From<String> for ControlValue {
    fn from(v: String) -> Self {
        ControlValue::Text(v)
    }
}

/// 控制存储 trait
///
/// 按名称保存停止标记等控制值。规则在执行过程中写入，调度器在规则返回后读取。
pub trait ControlStore: Send + Sync {
    /// 创建或覆盖一个条目
    fn add(&self, name: &str, value: ControlValue);

    /// 读取条目
    fn get(&self, name: &str) -> Result<ControlValue, ControlError>;

    /// 读取条目并转换为布尔值
    fn get_bool(&self, name: &str) -> Result<bool, ControlError> {
        self.get(name)?.as_bool(name)
    }
}

/// 内存控制存储
#[derive(Debug, Default)]
pub struct MemoryControlStore {
    values: RwLock<HashMap<String, ControlValue>>,
}

impl MemoryControlStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn remove(&self, name: &str) -> Option<ControlValue> {
        match self.values.write() {
            Ok(mut values) => values.remove(name),
            Err(_) => {
                tracing::error!(name = %name, "Failed to acquire write lock for control remove");
                None
            }
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values
            .read()
            .map(|values| values.contains_key(name))
            .unwrap_or(false)
    }

    pub fn clear(&self) {
        if let Ok(mut values) = self.values.write() {
            values.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.values.read().map(|values| values.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ControlStore for MemoryControlStore {
    fn add(&self, name: &str, value: ControlValue) {
        // 锁被污染时只记录错误，不影响调度
        match self.values.write() {
            Ok(mut values) => {
                values.insert(name.to_string(), value);
            }
            Err(_) => {
                tracing::error!(name = %name, "Failed to acquire write lock for control add");
            }
        }
    }

    fn get(&self, name: &str) -> Result<ControlValue, ControlError> {
        let values = self.values.read().map_err(|_| ControlError::Poisoned)?;
        values
            .get(name)
            .cloned()
            .ok_or_else(|| ControlError::NotFound(name.to_string()))
    }
}

impl<T: ControlStore + ?Sized> ControlStore for Arc<T> {
    fn add(&self, name: &str, value: ControlValue) {
        (**self).add(name, value)
    }

    fn get(&self, name: &str) -> Result<ControlValue, ControlError> {
        (**self).get(name)
    }
}

/// 直接停止标记
///
/// 调用方持有的单个布尔值，克隆后共享同一单元。不需要按名称查找，也不存在读取失败。
#[derive(Debug, Clone, Default)]
pub struct StopTag {
    flag: Arc<AtomicBool>,
}

impl StopTag {
    pub fn new(initial: bool) -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(initial)),
        }
    }

    pub fn get(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    pub fn set(&self, value: bool) {
        self.flag.store(value, Ordering::SeqCst);
    }
}
