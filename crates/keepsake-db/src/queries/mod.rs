mod memorials;
mod tributes;
mod users;
