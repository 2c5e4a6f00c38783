mod http_client;
mod memory_backend;
