// SPDX-License-Identifier: MIT

pub mod admin;
pub mod analyses;
pub mod dns_admin;
pub mod sse;
pub mod teams;
pub mod users;
