use sea_orm::sea_query::{Expr, Func, LikeExpr, LockType, Order};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, ExprTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Select,
};
use uuid::Uuid;

use crate::entity::image;

/// Which slice of an owner's images a query covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageFilter {
    /// Neither trashed nor archived.
    Active,
    /// Favorited and not trashed.
    Favorites,
    /// Archived and not trashed.
    Archived,
    Trashed,
    /// Not trashed, original name contains the term (case-insensitive).
    Search(String),
}

impl ImageFilter {
    fn apply(&self, select: Select<image::Entity>) -> Select<image::Entity> {
        match self {
            Self::Active => select
                .filter(image::Column::Trashed.eq(false))
                .filter(image::Column::Archived.eq(false)),
            Self::Favorites => select
                .filter(image::Column::Trashed.eq(false))
                .filter(image::Column::Favorite.eq(true)),
            Self::Archived => select
                .filter(image::Column::Trashed.eq(false))
                .filter(image::Column::Archived.eq(true)),
            Self::Trashed => select.filter(image::Column::Trashed.eq(true)),
            Self::Search(term) => {
                let select = select.filter(image::Column::Trashed.eq(false));
                let term = escape_like(term.trim());
                if term.is_empty() {
                    return select;
                }
                select.filter(
                    Expr::expr(Func::lower(Expr::col(image::Column::OriginalName)))
                        .like(LikeExpr::new(format!("%{}%", term.to_lowercase())).escape('\\')),
                )
            }
        }
    }
}

/// Escape LIKE wildcards so user input matches literally.
fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Sortable columns of the page listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortField {
    #[default]
    UploadedAt,
    Name,
    Size,
}

impl SortField {
    /// Parse a client-facing sort key. Accepts both camelCase and snake_case.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "createdAt" | "created_at" | "uploadedAt" | "uploaded_at" => Some(Self::UploadedAt),
            "originalName" | "original_name" | "name" => Some(Self::Name),
            "sizeBytes" | "size_bytes" | "size" => Some(Self::Size),
            _ => None,
        }
    }

    fn column(self) -> image::Column {
        match self {
            Self::UploadedAt => image::Column::CreatedAt,
            Self::Name => image::Column::OriginalName,
            Self::Size => image::Column::SizeBytes,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "asc" => Some(Self::Asc),
            "desc" => Some(Self::Desc),
            _ => None,
        }
    }

    fn order(self) -> Order {
        match self {
            Self::Asc => Order::Asc,
            Self::Desc => Order::Desc,
        }
    }
}

/// One page of the active listing. `page` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub size: u64,
    pub sort: SortField,
    pub order: SortOrder,
}

impl PageRequest {
    /// Rows skipped before this page, or `None` if it does not fit a SQL offset.
    pub fn offset(&self) -> Option<u64> {
        self.page
            .saturating_sub(1)
            .checked_mul(Ord::max(self.size, 1))
            .filter(|offset| i64::try_from(*offset).is_ok())
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            size: 10,
            sort: SortField::default(),
            order: SortOrder::default(),
        }
    }
}

/// Persistence for image rows. Every owner-facing query is scoped by owner.
pub struct ImageStore<'a, C: ConnectionTrait> {
    conn: &'a C,
}

impl<'a, C: ConnectionTrait> ImageStore<'a, C> {
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    /// Fetch by id with no owner or trash filtering.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<image::Model>, DbErr> {
        image::Entity::find_by_id(id).one(self.conn).await
    }

    /// Fetch by id with a `FOR UPDATE` lock. Only meaningful inside a transaction.
    pub async fn find_by_id_for_update(&self, id: Uuid) -> Result<Option<image::Model>, DbErr> {
        image::Entity::find_by_id(id)
            .lock(LockType::Update)
            .one(self.conn)
            .await
    }

    pub async fn find_by_checksum(
        &self,
        owner_id: i32,
        checksum: &str,
    ) -> Result<Option<image::Model>, DbErr> {
        image::Entity::find()
            .filter(image::Column::OwnerId.eq(owner_id))
            .filter(image::Column::Checksum.eq(checksum))
            .one(self.conn)
            .await
    }

    pub async fn insert(&self, model: image::ActiveModel) -> Result<image::Model, DbErr> {
        model.insert(self.conn).await
    }

    pub async fn save(&self, model: image::ActiveModel) -> Result<image::Model, DbErr> {
        model.update(self.conn).await
    }

    /// Delete a row. Returns `false` if it was already gone.
    pub async fn delete(&self, id: Uuid) -> Result<bool, DbErr> {
        let result = image::Entity::delete_by_id(id).exec(self.conn).await?;
        Ok(result.rows_affected > 0)
    }

    /// Every row matching `filter`, newest upload first.
    pub async fn list(&self, owner_id: i32, filter: &ImageFilter) -> Result<Vec<image::Model>, DbErr> {
        self.scoped(owner_id, filter)
            .order_by_desc(image::Column::CreatedAt)
            .order_by_desc(image::Column::Id)
            .all(self.conn)
            .await
    }

    /// One page of the active listing, plus the total number of active rows.
    pub async fn page(
        &self,
        owner_id: i32,
        request: &PageRequest,
    ) -> Result<(Vec<image::Model>, u64), DbErr> {
        let select = self.scoped(owner_id, &ImageFilter::Active);
        let total = select.clone().count(self.conn).await?;

        let size = Ord::max(request.size, 1);
        let offset = request
            .offset()
            .ok_or_else(|| DbErr::Custom(format!("page {} is out of range", request.page)))?;
        let order = request.order.order();
        let rows = select
            .order_by(request.sort.column(), order.clone())
            .order_by(image::Column::Id, order)
            .offset(Some(offset))
            .limit(Some(size))
            .all(self.conn)
            .await?;

        Ok((rows, total))
    }

    pub async fn count(&self, owner_id: i32, filter: &ImageFilter) -> Result<u64, DbErr> {
        self.scoped(owner_id, filter).count(self.conn).await
    }

    fn scoped(&self, owner_id: i32, filter: &ImageFilter) -> Select<image::Entity> {
        filter.apply(image::Entity::find().filter(image::Column::OwnerId.eq(owner_id)))
    }
}
