use crate::error::{Result, RuleError};
use crate::unit::SharedRule;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// 规则集
///
/// 同一组规则单元的两种视图：无序的全部规则（并发模式使用）和按优先级降序排列的序列
/// （顺序相关的模式使用）。排序视图始终是全集的一个排列。
#[derive(Clone, Default)]
pub struct RuleSet {
    entities: HashMap<String, SharedRule>,
    sorted: Vec<SharedRule>,
}

impl RuleSet {
    /// 从规则列表构建规则集
    ///
    /// 同名规则以后出现者为准，排序视图按优先级降序，同优先级保持输入顺序。
    pub fn new(rules: impl IntoIterator<Item = SharedRule>) -> Self {
        let mut unique: Vec<SharedRule> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();

        for rule in rules {
            match positions.get(rule.name()) {
                Some(&idx) => unique[idx] = rule,
                None => {
                    positions.insert(rule.name().to_string(), unique.len());
                    unique.push(rule);
                }
            }
        }

        let entities = unique
            .iter()
            .map(|r| (r.name().to_string(), r.clone()))
            .collect();

        let mut sorted = unique;
        sorted.sort_by(|a, b| b.priority().cmp(&a.priority()));

        Self { entities, sorted }
    }

    /// 使用外部构建好的两种视图
    pub fn from_parts(entities: HashMap<String, SharedRule>, sorted: Vec<SharedRule>) -> Result<Self> {
        if entities.len() != sorted.len() {
            return Err(RuleError::InvalidRuleSet(format!(
                "sorted view has {} rules, entity view has {}",
                sorted.len(),
                entities.len()
            )));
        }

        if let Some((key, rule)) = entities.iter().find(|(key, rule)| key.as_str() != rule.name()) {
            return Err(RuleError::InvalidRuleSet(format!(
                "entity key {} holds rule {}",
                key,
                rule.name()
            )));
        }

        {
            let mut seen = HashSet::new();
            for rule in &sorted {
                match entities.get(rule.name()) {
                    Some(entity) if same_unit(entity, rule) => {}
                    Some(_) => {
                        return Err(RuleError::InvalidRuleSet(format!(
                            "rule {} in the sorted view is a different unit than in the entity view",
                            rule.name()
                        )))
                    }
                    None => {
                        return Err(RuleError::InvalidRuleSet(format!(
                            "rule {} is missing from the entity view",
                            rule.name()
                        )))
                    }
                }
                if !seen.insert(rule.name()) {
                    return Err(RuleError::InvalidRuleSet(format!(
                        "rule {} appears more than once in the sorted view",
                        rule.name()
                    )));
                }
            }
        }

        Ok(Self { entities, sorted })
    }

    /// 全部规则（无序）
    pub fn entities(&self) -> &HashMap<String, SharedRule> {
        &self.entities
    }

    /// 按优先级降序排列的规则
    pub fn sorted_rules(&self) -> &[SharedRule] {
        &self.sorted
    }

    pub fn get(&self, name: &str) -> Option<&SharedRule> {
        self.entities.get(name)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn names_by_priority(&self) -> Vec<&str> {
        self.sorted.iter().map(|r| r.name()).collect()
    }
}

impl fmt::Debug for RuleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleSet")
            .field("rules", &self.names_by_priority())
            .finish()
    }
}

impl FromIterator<SharedRule> for RuleSet {
    fn from_iter<I: IntoIterator<Item = SharedRule>>(iter: I) -> Self {
        Self::new(iter)
    }
}

/// 比较两个规则句柄是否指向同一个单元
fn same_unit(a: &SharedRule, b: &SharedRule) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}
