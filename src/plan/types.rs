//! 计划数据模型与线格式
//!
//! 线格式（模型产出的 JSON）：{"plan": [{"function": "...", "parameters": {...}}]}。
//! 参数在解析时就被分类为 Literal / Reference：整串（允许首尾与花括号内空白）
//! 匹配 {{stepN_result}} 才算引用，混排内容一律按字面量，不做局部模板替换。

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 占位符语法：整串匹配才算引用
static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\{\{\s*step([0-9]+)_result\s*\}\}\s*$").unwrap());

/// 一次任务的计划：有序步骤列表，执行完即丢弃，不持久化
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub steps: Vec<Step>,
}

/// 单个步骤：工具名 + 参数表
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub function: String,
    pub parameters: BTreeMap<String, ParamValue>,
}

/// 参数值：字面量（任意 JSON）或对前序步骤结果的引用（1 起计数）
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Literal(Value),
    Reference(usize),
}

impl ParamValue {
    /// 线格式 -> 带类型的值
    pub fn from_wire(value: Value) -> Self {
        if let Value::String(s) = &value {
            if let Some(caps) = PLACEHOLDER_RE.captures(s) {
                if let Ok(n) = caps[1].parse::<usize>() {
                    return ParamValue::Reference(n);
                }
            }
        }
        ParamValue::Literal(value)
    }

    /// 带类型的值 -> 线格式（引用写回规范拼写的占位符）
    pub fn to_wire(&self) -> Value {
        match self {
            ParamValue::Literal(v) => v.clone(),
            ParamValue::Reference(n) => Value::String(placeholder(*n)),
        }
    }
}

/// 第 index 步结果在结果表中的键
pub fn result_key(index: usize) -> String {
    format!("step{}_result", index)
}

/// 第 index 步结果的占位符文本（规范拼写）
pub fn placeholder(index: usize) -> String {
    format!("{{{{step{}_result}}}}", index)
}

#[derive(Debug, Serialize, Deserialize)]
struct WirePlan {
    plan: Vec<WireStep>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireStep {
    function: String,
    #[serde(default)]
    parameters: serde_json::Map<String, Value>,
}

impl Plan {
    /// 解析线格式 JSON；结构不合法（缺 plan 数组、function 非字符串等）直接报错，
    /// 不带着畸形步骤继续往下走
    pub fn from_wire_json(text: &str) -> Result<Plan, String> {
        let wire: WirePlan = serde_json::from_str(text).map_err(|e| e.to_string())?;

        let mut steps = Vec::with_capacity(wire.plan.len());
        for (i, raw) in wire.plan.into_iter().enumerate() {
            if raw.function.trim().is_empty() {
                return Err(format!("step {}: empty function name", i + 1));
            }
            let parameters = raw
                .parameters
                .into_iter()
                .map(|(k, v)| (k, ParamValue::from_wire(v)))
                .collect();
            steps.push(Step {
                function: raw.function,
                parameters,
            });
        }
        Ok(Plan { steps })
    }

    /// 序列化回线格式 JSON（与 from_wire_json 互逆）
    pub fn to_wire_json(&self) -> String {
        let wire = WirePlan {
            plan: self
                .steps
                .iter()
                .map(|s| WireStep {
                    function: s.function.clone(),
                    parameters: s
                        .parameters
                        .iter()
                        .map(|(k, v)| (k.clone(), v.to_wire()))
                        .collect(),
                })
                .collect(),
        };
        serde_json::to_string_pretty(&wire).unwrap_or_else(|_| "{\"plan\": []}".to_string())
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
