use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rusqlite::{params, Connection};

use crate::models::{Appointment, AppointmentStatus, Barber, Client, Service, WorkingHours};

const DATE_FMT: &str = "%Y-%m-%d";
const TIME_FMT: &str = "%H:%M";
const DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

// ── Barbers ──

pub fn list_barbers(conn: &Connection) -> anyhow::Result<Vec<Barber>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, email, specialty, bio, photo_url, active, working_hours
         FROM barbers WHERE active = 1 ORDER BY name ASC",
    )?;

    let rows = stmt.query_map([], |row| Ok(parse_barber_row(row)))?;

    let mut barbers = vec![];
    for row in rows {
        barbers.push(row??);
    }
    Ok(barbers)
}

pub fn get_barber(conn: &Connection, id: &str) -> anyhow::Result<Option<Barber>> {
    let result = conn.query_row(
        "SELECT id, name, email, specialty, bio, photo_url, active, working_hours
         FROM barbers WHERE id = ?1",
        params![id],
        |row| Ok(parse_barber_row(row)),
    );

    match result {
        Ok(barber) => Ok(Some(barber?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn get_barber_by_email(conn: &Connection, email: &str) -> anyhow::Result<Option<Barber>> {
    let result = conn.query_row(
        "SELECT id, name, email, specialty, bio, photo_url, active, working_hours
         FROM barbers WHERE email = ?1",
        params![email],
        |row| Ok(parse_barber_row(row)),
    );

    match result {
        Ok(barber) => Ok(Some(barber?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn save_barber(conn: &Connection, barber: &Barber) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO barbers (id, name, email, specialty, bio, photo_url, active, working_hours)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(id) DO UPDATE SET
           name = excluded.name,
           email = excluded.email,
           specialty = excluded.specialty,
           bio = excluded.bio,
           photo_url = excluded.photo_url,
           active = excluded.active,
           working_hours = excluded.working_hours",
        params![
            barber.id,
            barber.name,
            barber.email,
            barber.specialty,
            barber.bio,
            barber.photo_url,
            barber.active as i32,
            barber.working_hours.to_json(),
        ],
    )?;
    Ok(())
}

pub fn update_working_hours(
    conn: &Connection,
    barber_id: &str,
    hours: &WorkingHours,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE barbers SET working_hours = ?1 WHERE id = ?2",
        params![hours.to_json(), barber_id],
    )?;
    Ok(count > 0)
}

fn parse_barber_row(row: &rusqlite::Row) -> anyhow::Result<Barber> {
    let hours_json: String = row.get(7)?;
    Ok(Barber {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        specialty: row.get(3)?,
        bio: row.get(4)?,
        photo_url: row.get(5)?,
        active: row.get::<_, i32>(6)? != 0,
        working_hours: WorkingHours::from_json(&hours_json)?,
    })
}

// ── Services ──

pub fn list_services(conn: &Connection) -> anyhow::Result<Vec<Service>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, description, price_cents, duration_minutes, active
         FROM services WHERE active = 1 ORDER BY price_cents ASC",
    )?;

    let rows = stmt.query_map([], |row| {
        Ok(Service {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            price_cents: row.get(3)?,
            duration_minutes: row.get(4)?,
            active: row.get::<_, i32>(5)? != 0,
        })
    })?;

    let mut services = vec![];
    for row in rows {
        services.push(row?);
    }
    Ok(services)
}

pub fn get_service(conn: &Connection, id: &str) -> anyhow::Result<Option<Service>> {
    let result = conn.query_row(
        "SELECT id, name, description, price_cents, duration_minutes, active
         FROM services WHERE id = ?1",
        params![id],
        |row| {
            Ok(Service {
                id: row.get(0)?,
                name: row.get(1)?,
                description: row.get(2)?,
                price_cents: row.get(3)?,
                duration_minutes: row.get(4)?,
                active: row.get::<_, i32>(5)? != 0,
            })
        },
    );

    match result {
        Ok(service) => Ok(Some(service)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn save_service(conn: &Connection, service: &Service) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO services (id, name, description, price_cents, duration_minutes, active)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(id) DO UPDATE SET
           name = excluded.name,
           description = excluded.description,
           price_cents = excluded.price_cents,
           duration_minutes = excluded.duration_minutes,
           active = excluded.active",
        params![
            service.id,
            service.name,
            service.description,
            service.price_cents,
            service.duration_minutes,
            service.active as i32,
        ],
    )?;
    Ok(())
}

// ── Clients ──

pub fn find_client_by_phone(conn: &Connection, phone: &str) -> anyhow::Result<Option<Client>> {
    let result = conn.query_row(
        "SELECT id, name, phone, created_at FROM clients WHERE phone = ?1",
        params![phone],
        |row| Ok(parse_client_row(row)),
    );

    match result {
        Ok(client) => Ok(Some(client?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn get_client(conn: &Connection, id: &str) -> anyhow::Result<Option<Client>> {
    let result = conn.query_row(
        "SELECT id, name, phone, created_at FROM clients WHERE id = ?1",
        params![id],
        |row| Ok(parse_client_row(row)),
    );

    match result {
        Ok(client) => Ok(Some(client?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn create_client(conn: &Connection, client: &Client) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO clients (id, name, phone, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![
            client.id,
            client.name,
            client.phone,
            client.created_at.format(DATETIME_FMT).to_string(),
        ],
    )?;
    Ok(())
}

pub fn update_client_name(conn: &Connection, id: &str, name: &str) -> anyhow::Result<()> {
    conn.execute(
        "UPDATE clients SET name = ?1 WHERE id = ?2",
        params![name, id],
    )?;
    Ok(())
}

fn parse_client_row(row: &rusqlite::Row) -> anyhow::Result<Client> {
    let created_at_str: String = row.get(3)?;
    Ok(Client {
        id: row.get(0)?,
        name: row.get(1)?,
        phone: row.get(2)?,
        created_at: NaiveDateTime::parse_from_str(&created_at_str, DATETIME_FMT)?,
    })
}

// ── Appointments ──

pub fn insert_appointment(conn: &Connection, apt: &Appointment) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO appointments (id, client_id, barber_id, service_id, service_name,
                                   price_cents, duration_minutes, date, start_time, status,
                                   notes, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            apt.id,
            apt.client_id,
            apt.barber_id,
            apt.service_id,
            apt.service_name,
            apt.price_cents,
            apt.duration_minutes,
            apt.date.format(DATE_FMT).to_string(),
            apt.start_time.format(TIME_FMT).to_string(),
            apt.status.as_str(),
            apt.notes,
            apt.created_at.format(DATETIME_FMT).to_string(),
            apt.updated_at.format(DATETIME_FMT).to_string(),
        ],
    )?;
    Ok(())
}

pub fn get_appointment(conn: &Connection, id: &str) -> anyhow::Result<Option<Appointment>> {
    let result = conn.query_row(
        &format!("SELECT {APPOINTMENT_COLS} FROM appointments WHERE id = ?1"),
        params![id],
        |row| Ok(parse_appointment_row(row)),
    );

    match result {
        Ok(apt) => Ok(Some(apt?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Non-cancelled appointments of one barber on one date, ascending by start
/// time. This is the set the overlap check and the availability engine run
/// against.
pub fn appointments_for_barber_on(
    conn: &Connection,
    barber_id: &str,
    date: NaiveDate,
) -> anyhow::Result<Vec<Appointment>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {APPOINTMENT_COLS} FROM appointments
         WHERE barber_id = ?1 AND date = ?2 AND status != 'cancelled'
         ORDER BY start_time ASC"
    ))?;

    let rows = stmt.query_map(
        params![barber_id, date.format(DATE_FMT).to_string()],
        |row| Ok(parse_appointment_row(row)),
    )?;

    let mut appointments = vec![];
    for row in rows {
        appointments.push(row??);
    }
    Ok(appointments)
}

/// Conditional status update: only flips the row if it is still in
/// `expected`. Returns false when the appointment vanished or moved on in the
/// meantime.
pub fn update_appointment_status(
    conn: &Connection,
    id: &str,
    expected: AppointmentStatus,
    target: AppointmentStatus,
    updated_at: NaiveDateTime,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE appointments SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status = ?4",
        params![
            target.as_str(),
            updated_at.format(DATETIME_FMT).to_string(),
            id,
            expected.as_str(),
        ],
    )?;
    Ok(count > 0)
}

/// A listing row joined with the display attributes the read paths need.
#[derive(Debug, Clone, serde::Serialize)]
pub struct AppointmentView {
    #[serde(flatten)]
    pub appointment: Appointment,
    pub barber_name: String,
    pub client_name: String,
    pub client_phone: String,
}

pub struct AppointmentQuery {
    pub client_phone: Option<String>,
    pub barber_id: Option<String>,
    pub date: Option<NaiveDate>,
    pub status: Option<AppointmentStatus>,
    pub descending: bool,
    pub limit: i64,
}

pub fn list_appointments(
    conn: &Connection,
    query: &AppointmentQuery,
) -> anyhow::Result<Vec<AppointmentView>> {
    let mut sql = format!(
        "SELECT {}, b.name, c.name, c.phone
         FROM appointments a
         JOIN barbers b ON b.id = a.barber_id
         JOIN clients c ON c.id = a.client_id
         WHERE 1=1",
        APPOINTMENT_COLS_PREFIXED
    );
    let mut params_vec: Vec<Box<dyn rusqlite::types::ToSql>> = vec![];

    if let Some(phone) = &query.client_phone {
        sql.push_str(&format!(" AND c.phone = ?{}", params_vec.len() + 1));
        params_vec.push(Box::new(phone.clone()));
    }
    if let Some(barber_id) = &query.barber_id {
        sql.push_str(&format!(" AND a.barber_id = ?{}", params_vec.len() + 1));
        params_vec.push(Box::new(barber_id.clone()));
    }
    if let Some(date) = &query.date {
        sql.push_str(&format!(" AND a.date = ?{}", params_vec.len() + 1));
        params_vec.push(Box::new(date.format(DATE_FMT).to_string()));
    }
    if let Some(status) = &query.status {
        sql.push_str(&format!(" AND a.status = ?{}", params_vec.len() + 1));
        params_vec.push(Box::new(status.as_str().to_string()));
    }

    let direction = if query.descending { "DESC" } else { "ASC" };
    sql.push_str(&format!(
        " ORDER BY a.date {direction}, a.start_time {direction} LIMIT ?{}",
        params_vec.len() + 1
    ));
    params_vec.push(Box::new(query.limit));

    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();

    let rows = stmt.query_map(params_refs.as_slice(), |row| {
        let barber_name: String = row.get(13)?;
        let client_name: String = row.get(14)?;
        let client_phone: String = row.get(15)?;
        Ok(parse_appointment_row(row).map(|appointment| AppointmentView {
            appointment,
            barber_name,
            client_name,
            client_phone,
        }))
    })?;

    let mut views = vec![];
    for row in rows {
        views.push(row??);
    }
    Ok(views)
}

const APPOINTMENT_COLS: &str = "id, client_id, barber_id, service_id, service_name, \
     price_cents, duration_minutes, date, start_time, status, notes, created_at, updated_at";

const APPOINTMENT_COLS_PREFIXED: &str =
    "a.id, a.client_id, a.barber_id, a.service_id, a.service_name, \
     a.price_cents, a.duration_minutes, a.date, a.start_time, a.status, a.notes, \
     a.created_at, a.updated_at";

fn parse_appointment_row(row: &rusqlite::Row) -> anyhow::Result<Appointment> {
    let date_str: String = row.get(7)?;
    let start_time_str: String = row.get(8)?;
    let status_str: String = row.get(9)?;
    let created_at_str: String = row.get(11)?;
    let updated_at_str: String = row.get(12)?;

    let status = AppointmentStatus::parse(&status_str)
        .ok_or_else(|| anyhow::anyhow!("unknown appointment status: {status_str}"))?;

    Ok(Appointment {
        id: row.get(0)?,
        client_id: row.get(1)?,
        barber_id: row.get(2)?,
        service_id: row.get(3)?,
        service_name: row.get(4)?,
        price_cents: row.get(5)?,
        duration_minutes: row.get(6)?,
        date: NaiveDate::parse_from_str(&date_str, DATE_FMT)?,
        start_time: NaiveTime::parse_from_str(&start_time_str, TIME_FMT)?,
        status,
        notes: row.get(10)?,
        created_at: NaiveDateTime::parse_from_str(&created_at_str, DATETIME_FMT)?,
        updated_at: NaiveDateTime::parse_from_str(&updated_at_str, DATETIME_FMT)?,
    })
}
