pub mod academic_years;
pub mod assignments;
pub mod core;
pub mod lesson_plans;
pub mod quotas;
pub mod schools;
pub mod setup;
pub mod subjects;
pub mod users;
