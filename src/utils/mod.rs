pub mod attendance_cache;
