pub mod ws_group_handler;
