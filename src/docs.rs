use crate::api::{
    admin::{CreateUserPage, ServiceListResponse, UserListResponse},
    chat::{SendMessageRequest, UnreadResponse},
    dashboard::{
        ActiveStepsResponse, CompletedGroup, CompletedJobsResponse, DashboardCounts,
        DashboardResponse, Pagination, UnitsResponse,
    },
    job::AssignJobForm,
    po::{CreatePoRequest, CreatePoResponse, CustomService},
    report::{OverdueUnit, ReportsResponse},
    unit::{CheckOutForm, NoteForm, NotesHistoryResponse, StockInForm, UnitInfoResponse},
};
use crate::auth::{
    auth::{Identity, RequestContext},
    session::SESSION_COOKIE,
};
use crate::model::{
    chat::{ChatMessage, Conversation, UnitChatMessage},
    job::{CompletedJob, OpenJob, Tech},
    note::Note,
    pricing::{PurchaseOrder, ServicePrice},
    role::Role,
    step::{ActiveStep, CalendarEvent, EventProps, Step, StepAverage},
    unit::{InventoryChecklist, LocationCount, Unit, UnitListRow},
    user::{ChatUser, UserSummary},
};
use crate::utils::flash::FlashMessage;
use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Autospa Shop API",
        version = "1.0.0",
        description = r#"
## Detail shop operations

Tracks vehicles (units) through reconditioning steps, assigns jobs to
technicians, records purchase orders and inventory checklists, and carries an
internal chat between staff.

### Security
Every route except `/login` needs the session cookie set by `POST /login`.
`/admin/*` additionally requires the `admin` role.

### Response format
Page-style endpoints return JSON with pending flash `messages` attached.
Errors are `{"error": "..."}`.
"#,
    ),
    paths(
        crate::api::dashboard::dashboard,
        crate::api::dashboard::overview_events,
        crate::api::dashboard::view_active,
        crate::api::dashboard::ready_pickup,
        crate::api::dashboard::completed_jobs,

        crate::api::unit::unit_info,
        crate::api::unit::pickup,
        crate::api::unit::stock_in,
        crate::api::unit::check_out,
        crate::api::unit::add_image,
        crate::api::unit::add_note,
        crate::api::unit::notes_history,
        crate::api::job::assign_job,
        crate::api::po::create_po,

        crate::api::report::reports,

        crate::api::chat::users,
        crate::api::chat::conversations,
        crate::api::chat::messages,
        crate::api::chat::send,
        crate::api::chat::unread,

        crate::api::admin::create_user_page,
        crate::api::admin::manage_users,
        crate::api::admin::services
    ),
    components(
        schemas(
            Identity,
            RequestContext,
            Role,
            FlashMessage,
            DashboardCounts,
            DashboardResponse,
            Pagination,
            ActiveStepsResponse,
            UnitsResponse,
            CompletedGroup,
            CompletedJobsResponse,
            UnitInfoResponse,
            StockInForm,
            CheckOutForm,
            NoteForm,
            NotesHistoryResponse,
            AssignJobForm,
            CreatePoRequest,
            CreatePoResponse,
            CustomService,
            ReportsResponse,
            OverdueUnit,
            SendMessageRequest,
            UnreadResponse,
            CreateUserPage,
            UserListResponse,
            ServiceListResponse,
            Unit,
            UnitListRow,
            InventoryChecklist,
            LocationCount,
            Step,
            ActiveStep,
            CalendarEvent,
            EventProps,
            StepAverage,
            OpenJob,
            CompletedJob,
            Tech,
            Note,
            ServicePrice,
            PurchaseOrder,
            ChatMessage,
            UnitChatMessage,
            Conversation,
            ChatUser,
            UserSummary
        )
    ),
    modifiers(&SessionCookie),
    security(("session" = [])),
    tags(
        (name = "Dashboard", description = "Overview counts, unit lists and calendar"),
        (name = "Unit", description = "Per-unit details, checklists, notes, images and jobs"),
        (name = "Reports", description = "Overdue units and step timing"),
        (name = "Chat", description = "Staff messaging"),
        (name = "Admin", description = "User and price list administration"),
    )
)]
pub struct ApiDoc;

struct SessionCookie;

impl Modify for SessionCookie {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "session",
            SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::new(SESSION_COOKIE))),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_routes_and_cookie_scheme() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/unit/{stock_number}"));
        assert!(doc.paths.paths.contains_key("/api/chat/send"));

        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("session"));
    }
}
