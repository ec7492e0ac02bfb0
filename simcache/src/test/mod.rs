mod cache;
mod resizer;
mod util;
