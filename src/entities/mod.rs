pub mod schedule_projection;
