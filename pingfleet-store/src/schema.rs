pub const CREATE_TABLES: &str = "
    CREATE TABLE IF NOT EXISTS prober (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        description TEXT,
        key TEXT NOT NULL DEFAULT '',
        added INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS target (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        description TEXT,
        ip TEXT NOT NULL,
        type TEXT NOT NULL DEFAULT 'icmp',
        port INTEGER,
        added INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS probe_group (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        description TEXT
    );

    CREATE TABLE IF NOT EXISTS probe_group_probers (
        group_id INTEGER NOT NULL REFERENCES probe_group(id),
        prober_id INTEGER NOT NULL REFERENCES prober(id),
        PRIMARY KEY (group_id, prober_id)
    );

    CREATE TABLE IF NOT EXISTS probe_group_targets (
        group_id INTEGER NOT NULL REFERENCES probe_group(id),
        target_id INTEGER NOT NULL REFERENCES target(id),
        PRIMARY KEY (group_id, target_id)
    );

    CREATE TABLE IF NOT EXISTS src_dst (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        prober_name TEXT NOT NULL,
        dst TEXT NOT NULL,
        datafile TEXT,
        UNIQUE (prober_name, dst)
    );

    CREATE TABLE IF NOT EXISTS message_queue (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        message INTEGER NOT NULL,
        posted INTEGER NOT NULL,
        read INTEGER NOT NULL DEFAULT 0
    );
";
