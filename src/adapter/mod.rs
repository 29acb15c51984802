pub mod daily_file;
