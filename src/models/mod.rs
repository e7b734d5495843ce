pub mod assignment;
pub mod department;
pub mod navigation;
pub mod user;
