pub mod create;
pub mod crumbs;
pub mod delete;
pub mod history;
pub mod init;
pub mod list;
pub mod mv;
pub mod session;
pub mod show;
pub mod tree;
pub mod update;
