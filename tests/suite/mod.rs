mod gateway;
mod page;
