pub mod auth;
pub mod rate_limit;

pub use auth::{
    admin_auth_middleware, customer_auth_middleware, staff_auth_middleware, AdminClaims,
    CustomerClaims, StaffClaims,
};
pub use rate_limit::{rate_limit_middleware, ClientIp};
