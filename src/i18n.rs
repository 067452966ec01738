use std::collections::HashMap;

const KEYWORD_HELP_EN: &str = "Normal Keywords:
Find keyword in the command string.
Examples:
\ttimedb --search python
\ttimedb --search '-f 48'
\ttimedb --search /home/user ls

Timerange Keywords:
Find only during the specified time range <start>-<end>.
One of start or end can be omitted, allowed time formats are
\td.m.y, d.m.y_hh, d.m.y_hh:mm, y-m-d, y-m-d_hh:mm, hh:mm (read as 'today' at this time)
If only a single time is given, the search is limited to the
following 24h period
Examples:
\ttimedb --search 2.1.2006-
\ttimedb --search 3.12.1998-4.12.1999_12:43
\ttimedb --search -- -1.1.2008
\ttimedb --search 10.10.1995
\ttimedb --search 2024-01-01-2024-01-02

Special Keywords (form <keyword>(<|=|>)value):
Find commands that satisfy certain runtime criteria.
Allowed keywords are:
\tWalltime\t<duration>\t\t'Walltime>10s'
\tUsertime\t<duration>\t\t'Usertime<2m10s'
\tSystemtime\t<duration>
\tExitcode\t<number>\t\t'Exitcode=1'
\tSignals\t\t<number>

Combined example:
\ttimedb --search 2.1.2015- python 'Walltime>30s' 'Exitcode=0'";

const KEYWORD_HELP_ZH: &str = "普通关键字:
在命令字符串中查找关键字。
示例:
\ttimedb --search python
\ttimedb --search '-f 48'
\ttimedb --search /home/user ls

时间范围关键字:
仅查找指定时间范围 <开始>-<结束> 内的记录。
开始或结束可以省略, 支持的时间格式:
\td.m.y, d.m.y_hh, d.m.y_hh:mm, y-m-d, y-m-d_hh:mm, hh:mm (视为今天的该时刻)
只给出一个时间时, 搜索其后 24 小时
示例:
\ttimedb --search 2.1.2006-
\ttimedb --search 3.12.1998-4.12.1999_12:43
\ttimedb --search -- -1.1.2008
\ttimedb --search 10.10.1995
\ttimedb --search 2024-01-01-2024-01-02

特殊关键字 (格式 <关键字>(<|=|>)值):
查找满足运行条件的命令。
可用关键字:
\tWalltime\t<时长>\t\t'Walltime>10s'
\tUsertime\t<时长>\t\t'Usertime<2m10s'
\tSystemtime\t<时长>
\tExitcode\t<整数>\t\t'Exitcode=1'
\tSignals\t\t<整数>

组合示例:
\ttimedb --search 2.1.2015- python 'Walltime>30s' 'Exitcode=0'";

const LICENSE: &str = "
    timedb  Copyright (C) 2016  Martin Hellmich (mhellmic@gmail.com)
    This program comes with ABSOLUTELY NO WARRANTY.
    This is free software, and you are welcome to redistribute it
    under certain conditions.";

pub struct I18n {
    translations: HashMap<String, HashMap<String, String>>,
    current_lang: String,
}

impl I18n {
    pub fn new(lang: &str) -> Self {
        let mut translations = HashMap::new();

        let mut en = HashMap::new();
        en.insert("keyword_help".to_string(), KEYWORD_HELP_EN.to_string());
        en.insert("license".to_string(), LICENSE.to_string());
        en.insert("no_command".to_string(), "No command to measure given. Exiting ...".to_string());
        en.insert("usage_hint".to_string(), "Usage: timedb [OPTIONS] <COMMAND>... (see --help)".to_string());
        en.insert("db_file".to_string(), "dbfile = {0}".to_string());
        en.insert("scan_summary".to_string(), "scanned {0} entries: {1} shown, {2} unmatched, {3} unreadable".to_string());
        en.insert("no_match".to_string(), "no record in the time range matched the given keywords".to_string());
        en.insert("error_open_store".to_string(), "Failed to open the history store".to_string());
        en.insert("error_store_record".to_string(), "Failed to store the measurement".to_string());
        en.insert("error_scan".to_string(), "Failed to read the history store".to_string());
        en.insert("error_close_store".to_string(), "Failed to flush the history store".to_string());
        en.insert("error_run".to_string(), "Failed to run the command".to_string());

        let mut zh = HashMap::new();
        zh.insert("keyword_help".to_string(), KEYWORD_HELP_ZH.to_string());
        zh.insert("license".to_string(), LICENSE.to_string());
        zh.insert("no_command".to_string(), "未指定要测量的命令, 退出 ...".to_string());
        zh.insert("usage_hint".to_string(), "用法: timedb [选项] <命令>... (参见 --help)".to_string());
        zh.insert("db_file".to_string(), "数据库文件 = {0}".to_string());
        zh.insert("scan_summary".to_string(), "扫描 {0} 条记录: 显示 {1} 条, 未匹配 {2} 条, 无法读取 {3} 条".to_string());
        zh.insert("no_match".to_string(), "时间范围内没有记录匹配给定的关键字".to_string());
        zh.insert("error_open_store".to_string(), "无法打开历史数据库".to_string());
        zh.insert("error_store_record".to_string(), "无法保存测量结果".to_string());
        zh.insert("error_scan".to_string(), "无法读取历史数据库".to_string());
        zh.insert("error_close_store".to_string(), "无法写入历史数据库".to_string());
        zh.insert("error_run".to_string(), "无法运行命令".to_string());

        translations.insert("en".to_string(), en);
        translations.insert("zh".to_string(), zh);

        // 确定语言 - 支持多种语言代码格式
        let effective_lang = if lang.starts_with("zh") || lang == "cn" || lang == "chinese" {
            "zh"
        } else {
            "en"
        };

        Self {
            translations,
            current_lang: effective_lang.to_string(),
        }
    }

    pub fn t(&self, key: &str) -> String {
        if let Some(lang_map) = self.translations.get(&self.current_lang) {
            if let Some(value) = lang_map.get(key) {
                return value.clone();
            }
        }
        key.to_string()
    }

    pub fn t_format(&self, key: &str, args: &[&str]) -> String {
        let template = self.t(key);
        let mut result = template;
        for (i, arg) in args.iter().enumerate() {
            result = result.replace(&format!("{{{}}}", i), arg);
        }
        result
    }
}
