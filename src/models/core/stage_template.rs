use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One ordered phase of a workflow template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTemplate {
    pub id: String,
    pub workflow_template_id: String,
    /// Instantiation order; ties are broken by `id`
    pub order_index: i32,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl StageTemplate {
    pub fn new(
        id: impl Into<String>,
        workflow_template_id: impl Into<String>,
        order_index: i32,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            workflow_template_id: workflow_template_id.into(),
            order_index,
            name: name.into(),
            created_at: Utc::now(),
        }
    }
}

/// Records that are instantiated in a declared order.
///
/// Sorting is ascending by `order_index` with `id` as the tie-breaker, so the
/// result never depends on the order a backing store returned rows in.
pub trait Ordered {
    fn order_index(&self) -> i32;
    fn order_id(&self) -> &str;
}

impl Ordered for StageTemplate {
    fn order_index(&self) -> i32 {
        self.order_index
    }

    fn order_id(&self) -> &str {
        &self.id
    }
}

pub fn sort_by_order<T: Ordered>(items: &mut [T]) {
    items.sort_by(|a, b| {
        a.order_index()
            .cmp(&b.order_index())
            .then_with(|| a.order_id().cmp(b.order_id()))
    });
}
