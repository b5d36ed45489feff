//! ICT Inventory: a single-tenant inventory dashboard over a sled document
//! store, with role-based row and column scoping.

pub mod auth;
pub mod columns;
pub mod models;
pub mod pages;
pub mod permissions;
pub mod rest;
pub mod storage;
pub mod tunnel;
