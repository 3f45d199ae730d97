pub use super::audit_logs::Entity as AuditLogs;
pub use super::files::Entity as Files;
pub use super::secure_links::Entity as SecureLinks;
pub use super::share_grants::Entity as ShareGrants;
pub use super::users::Entity as Users;
