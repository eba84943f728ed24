pub mod sea_orm_active_enums;
pub mod task;
pub mod todo_list;
pub mod user;
