use serde::{Serialize, Serializer};
use uuid::Uuid;

/// A rendered page whose cached copy is stale after a mutation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AffectedView {
    Home,
    Question(Uuid),
    Profile(Uuid),
    Community,
    Tags,
    Tag(String),
    Collection,
}

impl AffectedView {
    pub fn path(&self) -> String {
        match self {
            AffectedView::Home => "/".into(),
            AffectedView::Question(id) => format!("/question/{id}"),
            AffectedView::Profile(id) => format!("/profile/{id}"),
            AffectedView::Community => "/community".into(),
            AffectedView::Tags => "/tags".into(),
            AffectedView::Tag(name) => format!("/tags/{name}"),
            AffectedView::Collection => "/collection".into(),
        }
    }
}

impl Serialize for AffectedView {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.path())
    }
}

/// Response body of every mutating endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct Mutation<T> {
    pub data: T,
    pub revalidate: Vec<AffectedView>,
}

impl<T> Mutation<T> {
    pub fn new(data: T) -> Self {
        Self { data, revalidate: Vec::new() }
    }

    pub fn revalidate(mut self, view: AffectedView) -> Self {
        if !self.revalidate.contains(&view) {
            self.revalidate.push(view);
        }
        self
    }
}
