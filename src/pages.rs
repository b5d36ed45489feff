//! Inline HTML templates: login card, the two dashboards, user management
//! and the diagnostic error page.
//!
//! Templates are plain strings with `%NAME%` placeholders so the CSS/JS
//! braces stay readable. Dynamic values are HTML-escaped or injected as
//! JSON for the page scripts.

use std::collections::BTreeMap;

use crate::models::UserAccount;

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn json_for_script<T: serde::Serialize>(value: &T) -> String {
    // </script> inside a JSON string would terminate the block early
    serde_json::to_string(value)
        .unwrap_or_else(|_| "null".to_string())
        .replace("</", "<\\/")
}

const HEAD: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>%TITLE%</title>
    <link rel="stylesheet" href="https://cdn.jsdelivr.net/npm/bootstrap@4.6.0/dist/css/bootstrap.min.css">
    <link rel="stylesheet" href="https://cdn.datatables.net/1.13.4/css/jquery.dataTables.min.css">
    <style>
        body { background: #f8f9fa; }
        .navbar { background: %NAV_COLOR%; }
        .navbar-brand, .navbar-nav .nav-link, .navbar .user-info { color: #fff !important; }
        .card { box-shadow: 0 2px 12px rgba(0,0,0,0.08); border-radius: 1rem; padding: 1.5rem; }
        .toolbar { background: #fff; padding: 10px; border-radius: 8px; margin-bottom: 20px; }
        .toolbar .btn { margin-right: 8px; }
        .excel-cell { cursor: pointer; }
        .excel-cell input { border: none; width: 100%; outline: none; }
        .filter-select { width: 100%; font-size: 12px; }
        .user-info { padding: 8px 12px; }
    </style>
</head>
<body>"#;

const SCRIPTS: &str = r#"
    <script src="https://code.jquery.com/jquery-3.5.1.js"></script>
    <script src="https://cdn.jsdelivr.net/npm/bootstrap@4.6.0/dist/js/bootstrap.bundle.min.js"></script>
    <script src="https://cdn.datatables.net/1.13.4/js/jquery.dataTables.min.js"></script>"#;

fn head(title: &str, nav_color: &str) -> String {
    HEAD.replace("%TITLE%", title)
        .replace("%NAV_COLOR%", nav_color)
}

pub fn login_page(error: Option<&str>) -> String {
    let alert = match error {
        Some(msg) => format!(
            r#"<div class="alert alert-danger" role="alert">{}</div>"#,
            escape_html(msg)
        ),
        None => String::new(),
    };
    let mut page = head("ICT Inventory - Login", "#343a40");
    page.push_str(&format!(
        r#"
    <div class="container" style="max-width: 420px; margin-top: 10vh;">
        <div class="card">
            <h2 class="text-center mb-3">ICT Inventory</h2>
            <p class="text-center text-muted">Please sign in to continue</p>
            {alert}
            <form method="POST" action="/login">
                <div class="form-group">
                    <label for="username">Username</label>
                    <input type="text" class="form-control" id="username" name="username" required>
                </div>
                <div class="form-group">
                    <label for="password">Password</label>
                    <input type="password" class="form-control" id="password" name="password" required>
                </div>
                <button type="submit" class="btn btn-primary btn-block">Sign In</button>
            </form>
            <div class="text-muted mt-3" style="font-size: 14px;">
                <strong>Demo credentials</strong><br>
                Admin: admin / admin123<br>
                User: user / user123
            </div>
        </div>
    </div>
</body>
</html>"#
    ));
    page
}

const DASHBOARD_SCRIPT: &str = r#"
    <script>
    const columns = %COLUMNS%;
    const isAdmin = %IS_ADMIN%;
    let table;
    let allData = [];
    let columnFilters = {};

    $(document).ready(function() {
        const defs = [];
        if (isAdmin) {
            defs.push({ data: null, title: '', orderable: false, render: function(d, t, row) {
                return '<button class="btn btn-danger btn-sm delete-btn" data-id="' + row.record_id + '">&times;</button>';
            }});
        }
        columns.forEach(function(name, i) {
            defs.push({
                data: 'col_' + i, name: 'col_' + i, title: name, defaultContent: '',
                className: isAdmin ? 'excel-cell' : '',
                render: function(data, type, row) {
                    if (type === 'display') {
                        const id = isAdmin ? row.record_id : '';
                        return '<div class="cell-content" data-column="' + i + '" data-id="' + id + '">' + (data == null ? '' : data) + '</div>';
                    }
                    return data;
                }
            });
        });

        table = $('#grid').DataTable({
            processing: true,
            serverSide: false,
            ajax: { url: '/data', type: 'POST', dataSrc: function(json) { allData = json.data || []; return allData; } },
            columns: defs,
            pageLength: 25,
            scrollX: true,
            initComplete: createFilterRow
        });

        if (isAdmin) {
            $('#addNewBtn').click(addNewRow);
            $('#grid').on('click', '.delete-btn', function() {
                const id = $(this).data('id');
                if (confirm('Delete this record?')) {
                    $.ajax({ url: '/delete/' + id, method: 'DELETE', success: function() { table.ajax.reload(); } });
                }
            });
            $('#grid').on('click', '.cell-content', function() { startEdit($(this)); });
        }
        $('#clearFiltersBtn').click(clearAllFilters);
    });

    function createFilterRow() {
        const row = $('<tr class="filter-row"></tr>');
        if (isAdmin) { row.append('<th></th>'); }
        columns.forEach(function(name, i) {
            const values = uniqueValues(i);
            let html = '<select class="filter-select" data-column="' + i + '"><option value="">All</option>';
            values.forEach(function(v) { html += '<option>' + v + '</option>'; });
            html += '</select>';
            row.append('<th>' + html + '</th>');
        });
        $('#grid thead').append(row);
        $('.filter-select').on('change', function() {
            const i = $(this).data('column');
            const v = $(this).val();
            if (v === '') { delete columnFilters[i]; } else { columnFilters[i] = v; }
            applyFilters();
        });
    }

    function uniqueValues(i) {
        const seen = new Set();
        allData.forEach(function(row) {
            const v = row['col_' + i];
            if (v != null && String(v).trim() !== '') { seen.add(String(v).trim()); }
        });
        return Array.from(seen).sort();
    }

    function applyFilters() {
        $.fn.dataTable.ext.search.pop();
        $.fn.dataTable.ext.search.push(function(settings, data) {
            for (const i in columnFilters) {
                const offset = isAdmin ? 1 : 0;
                if (data[parseInt(i) + offset] !== columnFilters[i]) { return false; }
            }
            return true;
        });
        table.draw();
    }

    function clearAllFilters() {
        columnFilters = {};
        $('.filter-select').val('');
        applyFilters();
    }

    let editing = null;
    function startEdit(cell) {
        if (!cell.data('id')) { return; }
        if (editing) { finishEdit(); }
        editing = cell;
        const current = cell.text();
        cell.html('<input type="text" value="' + current.replace(/"/g, '&quot;') + '">');
        const input = cell.find('input');
        input.focus().select();
        input.on('blur', finishEdit);
        input.on('keydown', function(e) {
            if (e.key === 'Enter') { finishEdit(); }
            if (e.key === 'Escape') { editing.html(current); editing = null; }
        });
    }

    function finishEdit() {
        if (!editing) { return; }
        const cell = editing;
        editing = null;
        const value = cell.find('input').val();
        cell.html(value);
        const payload = {};
        payload[columns[cell.data('column')]] = value;
        $.ajax({
            url: '/edit/' + cell.data('id'),
            method: 'POST',
            contentType: 'application/json',
            data: JSON.stringify(payload),
            error: function() { alert('Error saving changes'); table.ajax.reload(); }
        });
    }

    function addNewRow() {
        const fields = {};
        columns.forEach(function(c) { fields[c] = ''; });
        $.ajax({
            url: '/add',
            method: 'POST',
            contentType: 'application/json',
            data: JSON.stringify(fields),
            success: function() { table.ajax.reload(); },
            error: function() { alert('Error adding new row'); }
        });
    }
    </script>
</body>
</html>"#;

pub fn admin_dashboard(username: &str, columns: &[String]) -> String {
    let mut page = head("ICT Inventory - Admin Dashboard", "#343a40");
    page.push_str(&format!(
        r#"
    <nav class="navbar navbar-expand-lg navbar-dark">
        <a class="navbar-brand" href="/">ICT Inventory - Admin</a>
        <div class="navbar-nav ml-auto">
            <span class="user-info">{username} (Admin)</span>
            <a class="nav-link" href="/logout">Logout</a>
        </div>
    </nav>
    <div class="container-fluid mt-4">
        <div class="toolbar">
            <button class="btn btn-success" id="addNewBtn">Add New Row</button>
            <button class="btn btn-warning" id="clearFiltersBtn">Clear All Filters</button>
            <a href="/manage_users" class="btn btn-info">Manage Users</a>
            <a href="/download" class="btn btn-secondary">Download CSV</a>
            <span class="text-muted ml-2">Click cells to edit</span>
        </div>
        <div class="card">
            <table id="grid" class="table table-striped table-bordered" style="width:100%">
                <thead></thead>
                <tbody></tbody>
            </table>
        </div>
    </div>"#,
        username = escape_html(username),
    ));
    page.push_str(SCRIPTS);
    page.push_str(
        &DASHBOARD_SCRIPT
            .replace("%COLUMNS%", &json_for_script(&columns))
            .replace("%IS_ADMIN%", "true"),
    );
    page
}

pub fn user_dashboard(username: &str, columns: &[String]) -> String {
    let mut page = head("ICT Inventory - User Dashboard", "#28a745");
    page.push_str(&format!(
        r#"
    <nav class="navbar navbar-expand-lg navbar-dark">
        <a class="navbar-brand" href="/">ICT Inventory</a>
        <div class="navbar-nav ml-auto">
            <span class="user-info">{username} (User)</span>
            <a class="nav-link" href="/logout">Logout</a>
        </div>
    </nav>
    <div class="container-fluid mt-4">
        <div class="toolbar">
            <button class="btn btn-warning" id="clearFiltersBtn">Clear All Filters</button>
            <a href="/download" class="btn btn-secondary">Download CSV</a>
            <span class="text-muted ml-2">Read-only access: view and filter inventory data</span>
        </div>
        <div class="card">
            <table id="grid" class="table table-striped table-bordered" style="width:100%">
                <thead></thead>
                <tbody></tbody>
            </table>
        </div>
    </div>"#,
        username = escape_html(username),
    ));
    page.push_str(SCRIPTS);
    page.push_str(
        &DASHBOARD_SCRIPT
            .replace("%COLUMNS%", &json_for_script(&columns))
            .replace("%IS_ADMIN%", "false"),
    );
    page
}

const MANAGE_USERS_SCRIPT: &str = r#"
    <script>
    const users = %USERS%;
    const locationValues = %LOCATION_VALUES%;
    const allColumns = %ALL_COLUMNS%;
    let editingId = null;

    $(document).ready(function() {
        const locDiv = $('#locationGrants');
        Object.keys(locationValues).forEach(function(field) {
            let html = '<div class="form-group"><label>' + field + '</label>';
            html += '<select multiple class="form-control loc-grant" data-field="' + field + '" size="4">';
            locationValues[field].forEach(function(v) { html += '<option>' + v + '</option>'; });
            html += '</select></div>';
            locDiv.append(html);
        });
        const colSel = $('#columnGrants');
        allColumns.forEach(function(c) { colSel.append('<option>' + c + '</option>'); });

        renderUsers();

        $('#userForm').submit(function(e) {
            e.preventDefault();
            const payload = {
                username: $('#username').val(),
                role: $('#role').val(),
                location_permissions: {},
                column_permissions: $('#columnGrants').val() || []
            };
            $('.loc-grant').each(function() {
                const selected = $(this).val() || [];
                if (selected.length) { payload.location_permissions[$(this).data('field')] = selected; }
            });
            let url = '/api/users', method = 'POST';
            if (editingId) { url += '/' + editingId; method = 'PUT'; }
            else { payload.password = $('#password').val(); }
            $.ajax({
                url: url, method: method, contentType: 'application/json',
                data: JSON.stringify(payload),
                success: function() { location.reload(); },
                error: function(xhr) {
                    const body = xhr.responseJSON;
                    alert(body && body.message ? body.message : 'Request failed');
                }
            });
        });

        $('#cancelEdit').click(function() { resetForm(); });
    });

    function renderUsers() {
        const tbody = $('#usersTable tbody').empty();
        users.forEach(function(u) {
            const grants = Object.keys(u.location_permissions || {}).map(function(f) {
                return f + ': ' + u.location_permissions[f].join(', ');
            }).join('; ') || 'All locations';
            const cols = (u.column_permissions || []).join(', ') || 'All columns';
            tbody.append('<tr><td>' + u.username + '</td><td>' + u.role + '</td><td>' + grants +
                '</td><td>' + cols + '</td><td>' +
                '<button class="btn btn-sm btn-primary" onclick="editUser(\'' + u.id + '\')">Edit</button> ' +
                '<button class="btn btn-sm btn-warning" onclick="resetPassword(\'' + u.id + '\')">Reset Password</button> ' +
                '<button class="btn btn-sm btn-danger" onclick="deleteUser(\'' + u.id + '\')">Delete</button>' +
                '</td></tr>');
        });
    }

    function editUser(id) {
        const u = users.find(function(x) { return x.id === id; });
        if (!u) { return; }
        editingId = id;
        $('#username').val(u.username);
        $('#role').val(u.role);
        $('#password').val('').prop('disabled', true);
        $('#columnGrants').val(u.column_permissions || []);
        $('.loc-grant').each(function() {
            $(this).val((u.location_permissions || {})[$(this).data('field')] || []);
        });
        $('#formTitle').text('Edit User');
        $('#cancelEdit').show();
    }

    function resetForm() {
        editingId = null;
        $('#userForm')[0].reset();
        $('#password').prop('disabled', false);
        $('#formTitle').text('Create User');
        $('#cancelEdit').hide();
    }

    function resetPassword(id) {
        const pw = prompt('New password:');
        if (!pw) { return; }
        $.ajax({
            url: '/api/users/' + id + '/reset-password', method: 'POST',
            contentType: 'application/json', data: JSON.stringify({ password: pw }),
            success: function() { alert('Password reset'); }
        });
    }

    function deleteUser(id) {
        if (!confirm('Delete this user?')) { return; }
        $.ajax({ url: '/api/users/' + id, method: 'DELETE', success: function() { location.reload(); } });
    }
    </script>
</body>
</html>"#;

pub fn manage_users_page(
    username: &str,
    users: &[UserAccount],
    location_values: &BTreeMap<String, Vec<String>>,
    all_columns: &[String],
) -> String {
    // Never ship passwords to the page
    #[derive(serde::Serialize)]
    struct UserView<'a> {
        id: &'a str,
        username: &'a str,
        role: &'a crate::models::Role,
        location_permissions: &'a crate::models::LocationPermissions,
        column_permissions: &'a [String],
    }
    let views: Vec<UserView> = users
        .iter()
        .map(|u| UserView {
            id: &u.id,
            username: &u.username,
            role: &u.role,
            location_permissions: &u.location_permissions,
            column_permissions: &u.column_permissions,
        })
        .collect();

    let mut page = head("ICT Inventory - User Management", "#343a40");
    page.push_str(&format!(
        r#"
    <nav class="navbar navbar-expand-lg navbar-dark">
        <a class="navbar-brand" href="/admin">ICT Inventory - User Management</a>
        <div class="navbar-nav ml-auto">
            <span class="user-info">{username} (Admin)</span>
            <a class="nav-link" href="/admin">Back to Dashboard</a>
            <a class="nav-link" href="/logout">Logout</a>
        </div>
    </nav>
    <div class="container mt-4">
        <div class="row">
            <div class="col-md-5">
                <div class="card">
                    <h4 id="formTitle">Create User</h4>
                    <form id="userForm">
                        <div class="form-group">
                            <label for="username">Username</label>
                            <input type="text" class="form-control" id="username" required>
                        </div>
                        <div class="form-group">
                            <label for="password">Password</label>
                            <input type="password" class="form-control" id="password">
                        </div>
                        <div class="form-group">
                            <label for="role">Role</label>
                            <select class="form-control" id="role">
                                <option value="user">user</option>
                                <option value="admin">admin</option>
                            </select>
                        </div>
                        <h6>Location permissions</h6>
                        <div id="locationGrants"></div>
                        <div class="form-group">
                            <label for="columnGrants">Column permissions (empty = all)</label>
                            <select multiple class="form-control" id="columnGrants" size="6"></select>
                        </div>
                        <button type="submit" class="btn btn-primary">Save</button>
                        <button type="button" class="btn btn-secondary" id="cancelEdit" style="display:none;">Cancel</button>
                    </form>
                </div>
            </div>
            <div class="col-md-7">
                <div class="card">
                    <h4>Users</h4>
                    <table class="table table-sm" id="usersTable">
                        <thead><tr><th>Username</th><th>Role</th><th>Locations</th><th>Columns</th><th></th></tr></thead>
                        <tbody></tbody>
                    </table>
                </div>
            </div>
        </div>
    </div>"#,
        username = escape_html(username),
    ));
    page.push_str(SCRIPTS);
    page.push_str(
        &MANAGE_USERS_SCRIPT
            .replace("%USERS%", &json_for_script(&views))
            .replace("%LOCATION_VALUES%", &json_for_script(location_values))
            .replace("%ALL_COLUMNS%", &json_for_script(&all_columns)),
    );
    page
}

/// Diagnostic page for any failure during a page render. This is an
/// internal demo tool; showing the error detail beats a blank 500.
pub fn error_page(context: &str, detail: &str) -> String {
    let mut page = head("ICT Inventory - Error", "#343a40");
    page.push_str(&format!(
        r#"
    <div class="container mt-4">
        <h2>{context}</h2>
        <div class="alert alert-danger">
            <pre>{detail}</pre>
        </div>
        <a href="/" class="btn btn-primary">Back</a>
    </div>
</body>
</html>"#,
        context = escape_html(context),
        detail = escape_html(detail),
    ));
    page
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_page_escapes_the_error_message() {
        let page = login_page(Some("<script>alert(1)</script>"));
        assert!(!page.contains("<script>alert(1)</script>"));
        assert!(page.contains("&lt;script&gt;"));
    }

    #[test]
    fn dashboards_embed_the_column_list() {
        let columns = vec!["Asset Tag".to_string(), "Building".to_string()];
        let admin = admin_dashboard("admin", &columns);
        assert!(admin.contains(r#"const columns = ["Asset Tag","Building"]"#));
        assert!(admin.contains("const isAdmin = true"));

        let user = user_dashboard("lea", &columns);
        assert!(user.contains("const isAdmin = false"));
        assert!(!user.contains("Manage Users"));
    }

    #[test]
    fn manage_users_page_never_embeds_passwords() {
        let users = vec![UserAccount {
            id: "u1".into(),
            username: "lea".into(),
            password: "topsecret".into(),
            role: crate::models::Role::User,
            location_permissions: Default::default(),
            column_permissions: vec![],
        }];
        let page = manage_users_page("admin", &users, &BTreeMap::new(), &[]);
        assert!(!page.contains("topsecret"));
        assert!(page.contains("lea"));
    }
}
