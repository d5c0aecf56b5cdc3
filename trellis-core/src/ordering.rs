//! 排序约定 - Ordered / PriorityOrdered
//!
//! 后置处理器按三个层级排序：PriorityOrdered → Ordered → 无序。
//! 层级在 Bean 定义上声明（无需实例化即可按层级发现），
//! 层级内的 order 值从实例读取，在发现时一次性解析成 `OrderKey` 再排序。

use std::cmp::Ordering;
use std::sync::Arc;

/// 最高优先级
pub const HIGHEST_PRECEDENCE: i32 = i32::MIN;

/// 最低优先级（无序对象的默认值）
pub const LOWEST_PRECEDENCE: i32 = i32::MAX;

/// 可排序对象
///
/// order 值越小优先级越高
pub trait Ordered: Send + Sync {
    fn order(&self) -> i32;
}

/// 优先排序标记
///
/// 实现此 trait 的对象总是排在普通 `Ordered` 对象之前，
/// 不论 order 值大小
pub trait PriorityOrdered: Ordered {}

/// 排序层级
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OrderTier {
    PriorityOrdered,
    Ordered,
    Unordered,
}

/// 解析后的排序键
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderKey {
    pub tier: OrderTier,
    pub order: i32,
}

impl OrderKey {
    pub fn new(tier: OrderTier, order: i32) -> Self {
        Self { tier, order }
    }

    pub fn unordered() -> Self {
        Self {
            tier: OrderTier::Unordered,
            order: LOWEST_PRECEDENCE,
        }
    }
}

impl Default for OrderKey {
    fn default() -> Self {
        Self::unordered()
    }
}

/// 带排序键的条目
#[derive(Clone)]
pub struct Prioritized<T> {
    pub bean_name: String,
    pub key: OrderKey,
    pub value: T,
}

impl<T> Prioritized<T> {
    pub fn new(bean_name: impl Into<String>, key: OrderKey, value: T) -> Self {
        Self {
            bean_name: bean_name.into(),
            key,
            value,
        }
    }
}

/// 依赖感知的比较器，可由 BeanFactory 注入以替换默认的 order 比较
pub type DependencyComparator = Arc<dyn Fn(&str, OrderKey, &str, OrderKey) -> Ordering + Send + Sync>;

/// 默认比较器：先比较层级是否为 PriorityOrdered，再比较 order 值
pub struct OrderComparator;

impl OrderComparator {
    pub fn compare(a: OrderKey, b: OrderKey) -> Ordering {
        let a_priority = a.tier == OrderTier::PriorityOrdered;
        let b_priority = b.tier == OrderTier::PriorityOrdered;
        match (a_priority, b_priority) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            _ => a.order.cmp(&b.order),
        }
    }

    /// 稳定排序
    pub fn sort<T>(items: &mut [Prioritized<T>], comparator: Option<&DependencyComparator>) {
        match comparator {
            Some(cmp) => items.sort_by(|a, b| cmp(&a.bean_name, a.key, &b.bean_name, b.key)),
            None => items.sort_by(|a, b| Self::compare(a.key, b.key)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_tier_wins_over_order_value() {
        let priority = OrderKey::new(OrderTier::PriorityOrdered, 100);
        let ordered = OrderKey::new(OrderTier::Ordered, -100);
        assert_eq!(OrderComparator::compare(priority, ordered), Ordering::Less);
        assert_eq!(OrderComparator::compare(ordered, priority), Ordering::Greater);
    }

    #[test]
    fn test_sort_is_stable_within_equal_order() {
        let mut items = vec![
            Prioritized::new("b", OrderKey::new(OrderTier::Ordered, 5), 'b'),
            Prioritized::new("a", OrderKey::new(OrderTier::Ordered, 1), 'a'),
            Prioritized::new("c", OrderKey::new(OrderTier::Ordered, 5), 'c'),
        ];
        OrderComparator::sort(&mut items, None);
        let names: Vec<_> = items.iter().map(|i| i.value).collect();
        assert_eq!(names, vec!['a', 'b', 'c']);
    }

    #[test]
    fn test_custom_comparator_is_used() {
        let reverse: DependencyComparator = Arc::new(|_, a, _, b| b.order.cmp(&a.order));
        let mut items = vec![
            Prioritized::new("x", OrderKey::new(OrderTier::Ordered, 1), 1),
            Prioritized::new("y", OrderKey::new(OrderTier::Ordered, 2), 2),
        ];
        OrderComparator::sort(&mut items, Some(&reverse));
        assert_eq!(items[0].value, 2);
    }
}
