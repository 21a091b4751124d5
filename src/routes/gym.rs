//! Built-in route table of the gym management client.
//!
//! Everything under `/application` sits behind the authenticated layout. The
//! catch-all `NotFound` route is declared *inside* the layout with an absolute
//! path, so unknown locations still require a subject.

use super::descriptor::{Intent, RouteDescriptor};

/// Name of the login route.
pub const LOGIN: &str = "login";
/// Name of the catch-all route.
pub const NOT_FOUND: &str = "NotFound";
/// Self-service time-in route.
pub const TIME_IN: &str = "TimeIn";
/// Self-service time-out route.
pub const TIME_OUT: &str = "TimeOut";
/// Time-in on behalf of the subject named by the `:id` parameter.
pub const STAFF_TIME_IN: &str = "StaffTimeIn";
/// Time-out on behalf of the subject named by the `:id` parameter.
pub const STAFF_TIME_OUT: &str = "StaffTimeOut";

fn screen(path: &str, name: &str, title: &str) -> RouteDescriptor {
    RouteDescriptor::new(path).named(name).titled(title)
}

/// The gym client's route descriptors.
#[must_use]
pub fn gym_routes() -> Vec<RouteDescriptor> {
    vec![
        screen("/", "landing-page", "Welcome").requires_unauth(),
        screen("/login", LOGIN, "Login").requires_unauth(),
        screen("/register", "register", "Register").requires_unauth(),
        RouteDescriptor::new("/application")
            .requires_auth()
            .with_children(vec![
                screen("dashboard", "Dashboard", "Dashboard"),
                // User directory
                screen("users", "Users", "Users"),
                screen("users/create", "CreateUser", "Create User"),
                screen("users/:id", "ShowUser", "User"),
                screen("users/edit/:id", "EditUser", "Edit User"),
                // Exercise library
                screen("exercises", "Exercises", "Exercises"),
                screen("exercises/create", "CreateExercise", "Create Exercise"),
                screen("exercises/:id", "ShowExercise", "Exercise"),
                screen("exercises/edit/:id", "EditExercise", "Edit Exercise"),
                // Nutrition and meals
                screen("nutrition", "Nutrition", "Nutrition"),
                screen("nutrition/meals/create", "CreateMeal", "Log Meal"),
                screen("nutrition/meals/:id", "ShowMeal", "Meal"),
                screen("progress", "Progress", "Progress"),
                // Shop
                screen("shop", "Shop", "Shop"),
                screen("shop/products/:id", "ShowProduct", "Product"),
                // Staff attendance
                screen("attendance", "Attendance", "Attendance"),
                screen("attendance/time-in", TIME_IN, "Time In").with_intent(Intent::BeginSession),
                screen("attendance/time-out", TIME_OUT, "Time Out").with_intent(Intent::EndSession),
                screen("attendance/:id/time-in", STAFF_TIME_IN, "Time In")
                    .with_intent(Intent::BeginSession),
                screen("attendance/:id/time-out", STAFF_TIME_OUT, "Time Out")
                    .with_intent(Intent::EndSession),
                screen("/:pathMatch(.*)*", NOT_FOUND, "Page Not Found"),
            ]),
    ]
}
