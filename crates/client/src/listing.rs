//! Abstract list view state
//!
//! The view fetches an event's abstracts in one call and then filters and
//! pages them locally. Setters report whether the change needs a refetch
//! or only a local re-filter.

use crate::api::{AbstractApi, ListScope};
use crate::errors::ClientResult;
use crate::session::Session;
use atlas_common::abstracts::{Abstract, Category};
use atlas_common::auth::Role;
use atlas_common::listing::{paginate, FilterSet, ListQuery, Page, PageSize, StatusFilter};

/// Server list limit used for the one-shot fetch
pub const FETCH_LIMIT: usize = 10_000;

/// What a state change requires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewChange {
    Unchanged,
    /// Apply the filters again to the loaded records
    Refilter,
    /// Load the records again from the server
    Refetch,
}

#[derive(Debug, Clone)]
pub struct AbstractListView {
    event_id: String,
    role: Role,
    category: Option<String>,
    status: StatusFilter,
    search: String,
    page: usize,
    page_size: PageSize,
    records: Vec<Abstract>,
    categories: Vec<Category>,
}

impl AbstractListView {
    pub fn new(event_id: impl Into<String>, role: Role) -> Self {
        Self {
            event_id: event_id.into(),
            role,
            category: None,
            status: StatusFilter::All,
            search: String::new(),
            page: 1,
            page_size: PageSize::default(),
            records: Vec::new(),
            categories: Vec::new(),
        }
    }

    pub fn event_id(&self) -> &str {
        &self.event_id
    }

    fn scope(&self) -> ListScope {
        if self.role.is_submitter() {
            ListScope::Own
        } else {
            ListScope::Event
        }
    }

    /// Query sent on (re)fetch
    pub fn fetch_query(&self) -> ListQuery {
        ListQuery {
            category: self.category.clone(),
            status: Some(self.status),
            ..ListQuery::fetch_all(FETCH_LIMIT)
        }
    }

    /// Load records and the category taxonomy for the current event
    pub async fn load<A>(&mut self, api: &A, session: &Session) -> ClientResult<()>
    where
        A: AbstractApi + ?Sized,
    {
        let query = self.fetch_query();
        let (records, settings) = futures::try_join!(
            api.list_abstracts(session, &self.event_id, self.scope(), &query),
            api.get_settings(session, &self.event_id),
        )?;

        tracing::debug!(
            event_id = %self.event_id,
            count = records.len(),
            "Loaded abstract list"
        );
        self.records = records;
        self.categories = settings.categories;
        Ok(())
    }

    /// Replace one record after a single-abstract action
    pub fn replace(&mut self, record: Abstract) {
        match self.records.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => *existing = record,
            None => self.records.push(record),
        }
    }

    pub fn remove(&mut self, id: &str) {
        self.records.retain(|r| r.id != id);
    }

    pub fn set_event(&mut self, event_id: &str) -> ViewChange {
        if self.event_id == event_id {
            return ViewChange::Unchanged;
        }
        self.event_id = event_id.to_string();
        self.records.clear();
        self.categories.clear();
        self.page = 1;
        ViewChange::Refetch
    }

    pub fn set_role(&mut self, role: Role) -> ViewChange {
        if self.role == role {
            return ViewChange::Unchanged;
        }
        self.role = role;
        ViewChange::Refetch
    }

    pub fn set_category(&mut self, category: Option<&str>) -> ViewChange {
        let category = category
            .map(str::trim)
            .filter(|c| !c.is_empty() && *c != "all")
            .map(str::to_string);
        if self.category == category {
            return ViewChange::Unchanged;
        }
        self.category = category;
        ViewChange::Refetch
    }

    /// Status tab
    pub fn set_status(&mut self, status: StatusFilter) -> ViewChange {
        if self.status == status {
            return ViewChange::Unchanged;
        }
        self.status = status;
        ViewChange::Refetch
    }

    /// Applied immediately, no debounce
    pub fn set_search(&mut self, text: &str) -> ViewChange {
        if self.search == text {
            return ViewChange::Unchanged;
        }
        self.search = text.to_string();
        ViewChange::Refilter
    }

    pub fn set_page(&mut self, page: usize) {
        self.page = page.max(1);
    }

    /// Only the offered sizes are accepted
    pub fn set_page_size(&mut self, size: usize) -> ClientResult<ViewChange> {
        let size = PageSize::new(size)?;
        if self.page_size == size {
            return Ok(ViewChange::Unchanged);
        }
        self.page_size = size;
        self.page = 1;
        Ok(ViewChange::Refilter)
    }

    pub fn filters(&self) -> FilterSet {
        FilterSet::new()
            .search(&self.search)
            .category(self.category.as_deref().unwrap_or_default())
            .status(self.status)
    }

    pub fn filtered(&self) -> Vec<&Abstract> {
        self.filters().apply(&self.records, &self.categories)
    }

    /// Current page. A page past the end snaps back to page 1.
    pub fn current_page(&mut self) -> Page<&Abstract> {
        let filters = self.filters();
        let filtered = filters.apply(&self.records, &self.categories);
        let page = paginate(filtered, self.page, self.page_size.get());
        self.page = page.page;
        page
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MockAbstractApi;
    use crate::testing::abstract_with;
    use atlas_common::abstracts::{AbstractSettings, AbstractStatus, Owner};

    fn seeded(n: usize) -> MockAbstractApi {
        let records = (1..=n).map(|i| {
            let mut record = abstract_with(&format!("a{:02}", i), AbstractStatus::Submitted);
            if i % 5 == 0 {
                record.status = AbstractStatus::Accepted;
                record.title = format!("Accepted study {}", i);
            }
            record
        });
        MockAbstractApi::new()
            .with_settings(AbstractSettings {
                categories: vec![Category {
                    id: "cat-cardio".into(),
                    name: "Cardiology".into(),
                    sub_topics: vec![],
                    reviewer_ids: vec![],
                }],
                ..AbstractSettings::default()
            })
            .with_abstracts(records)
    }

    fn admin() -> Session {
        Session::new(Role::Admin, "token")
    }

    #[tokio::test]
    async fn twenty_five_items_make_three_pages() {
        let api = seeded(25);
        let mut view = AbstractListView::new("evt-1", Role::Admin);
        view.load(&api, &admin()).await.unwrap();

        let first = view.current_page();
        assert_eq!(first.total_pages, 3);
        assert_eq!(first.items.len(), 10);

        view.set_page(3);
        let last = view.current_page();
        assert_eq!(last.items.len(), 5);
        assert_eq!(last.items[0].id, "a21");
    }

    #[tokio::test]
    async fn narrowing_search_resets_page() {
        let api = seeded(25);
        let mut view = AbstractListView::new("evt-1", Role::Admin);
        view.load(&api, &admin()).await.unwrap();

        view.set_page(3);
        assert_eq!(view.set_search("accepted study"), ViewChange::Refilter);
        let page = view.current_page();
        assert_eq!(page.page, 1);
        assert_eq!(page.total_items, 5);
        assert_eq!(page.total_pages, 1);
    }

    #[tokio::test]
    async fn submitters_only_see_their_own() {
        let mut mine = abstract_with("a1", AbstractStatus::Draft);
        mine.owner = Owner::Author("auth-7".into());
        let api = MockAbstractApi::new().with_abstracts([mine, abstract_with("a2", AbstractStatus::Submitted)]);

        let session = Session::new(Role::Author, "t").with_user("auth-7");
        let mut view = AbstractListView::new("evt-1", Role::Author);
        view.load(&api, &session).await.unwrap();
        let ids: Vec<&str> = view.filtered().iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, ["a1"]);
    }

    #[test]
    fn refetch_triggers() {
        let mut view = AbstractListView::new("evt-1", Role::Admin);
        assert_eq!(view.set_event("evt-1"), ViewChange::Unchanged);
        assert_eq!(view.set_event("evt-2"), ViewChange::Refetch);
        assert_eq!(view.set_category(Some("cat-cardio")), ViewChange::Refetch);
        assert_eq!(view.set_category(Some("cat-cardio")), ViewChange::Unchanged);
        assert_eq!(view.set_category(Some("all")), ViewChange::Refetch);
        assert_eq!(
            view.set_status(StatusFilter::Only(AbstractStatus::Pending)),
            ViewChange::Refetch
        );
        assert_eq!(view.set_role(Role::Reviewer), ViewChange::Refetch);
        assert_eq!(view.set_search("heart"), ViewChange::Refilter);
    }

    #[test]
    fn page_size_must_be_offered() {
        let mut view = AbstractListView::new("evt-1", Role::Admin);
        assert!(view.set_page_size(25).is_err());
        assert_eq!(view.set_page_size(50).unwrap(), ViewChange::Refilter);
        assert_eq!(view.set_page_size(50).unwrap(), ViewChange::Unchanged);
    }

    #[test]
    fn status_tab_filters_locally() {
        let mut view = AbstractListView::new("evt-1", Role::Admin);
        view.replace(abstract_with("a1", AbstractStatus::Submitted));
        view.replace(abstract_with("a2", AbstractStatus::Rejected));
        view.set_status(StatusFilter::Only(AbstractStatus::Rejected));
        let ids: Vec<&str> = view.filtered().iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, ["a2"]);

        view.remove("a2");
        assert!(view.filtered().is_empty());
    }
}
