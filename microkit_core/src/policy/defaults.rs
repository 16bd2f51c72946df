use super::oracle::Policy;

/// Rule set every service starts with: signed-in users may reach the stock
/// user endpoints and operations, and anyone may sign up.
pub fn default_policies() -> Vec<Policy> {
    let http_routes = [
        ("role_user", "/user/:id", "GET"),
        ("*", "/user/signup", "POST"),
        ("role_user", "/user/app", "GET"),
        ("role_user", "/metrics", "GET"),
    ];

    let endpoints = [
        ("role_user", "create-user", "*"),
        ("role_user", "check-if-user-exists", "*"),
        ("role_user", "get-user-by-id", "*"),
        ("role_user", "get-app-data", "*"),
    ];

    http_routes
        .iter()
        .chain(endpoints.iter())
        .map(|(subject, object, action)| Policy::new(*subject, *object, *action))
        .collect()
}
